//! Ingest Ledger - rusqlite 기반 인제스트 기록
//!
//! 어떤 파일로 인덱스를 만들었는지 남겨 `status`에서 보여줍니다.
//! 저장 위치: `<index_root>/ingest.db`

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};

use crate::backend::Backend;

/// 레저 파일 이름
pub const LEDGER_FILE: &str = "ingest.db";

/// 보관하는 최근 실행 수 (오래된 기록은 새 기록 저장 시 삭제)
pub const MAX_RECORDED_RUNS: usize = 50;

// ============================================================================
// Types
// ============================================================================

/// 기록된 인제스트 실행
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRun {
    pub id: i64,
    pub files: Vec<String>,
    pub char_count: usize,
    pub chunk_count: usize,
    pub backends: Vec<Backend>,
    pub created_at: DateTime<Utc>,
}

/// 새 실행 기록 입력
#[derive(Debug, Clone)]
pub struct NewIngestRun {
    pub files: Vec<String>,
    pub char_count: usize,
    pub chunk_count: usize,
    pub backends: Vec<Backend>,
}

// ============================================================================
// IngestLedger
// ============================================================================

pub struct IngestLedger {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl IngestLedger {
    /// 레저 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create ledger directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let ledger = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        ledger.initialize()?;
        Ok(ledger)
    }

    /// 인덱스 루트 아래 기본 위치에서 열기
    pub fn open_in(index_root: &Path) -> Result<Self> {
        Self::open(&index_root.join(LEDGER_FILE))
    }

    /// 이미 있는 레저만 열기 (파일이 없으면 None, 아무것도 만들지 않음)
    pub fn open_existing_in(index_root: &Path) -> Result<Option<Self>> {
        let path = index_root.join(LEDGER_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        Self::open(&path).map(Some)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS ingest_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                files TEXT NOT NULL,
                char_count INTEGER NOT NULL,
                chunk_count INTEGER NOT NULL,
                backends TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create ingest_runs table")?;

        tracing::debug!("Ingest ledger initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 실행 기록 저장
    pub fn record_run(&self, run: &NewIngestRun) -> Result<i64> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let files = serde_json::to_string(&run.files)?;
        let backends = serde_json::to_string(&run.backends)?;

        conn.execute(
            "INSERT INTO ingest_runs (files, char_count, chunk_count, backends, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                files,
                run.char_count as i64,
                run.chunk_count as i64,
                backends,
                Utc::now().to_rfc3339()
            ],
        )
        .context("Failed to record ingest run")?;

        let id = conn.last_insert_rowid();

        let pruned = conn
            .execute(
                "DELETE FROM ingest_runs WHERE id NOT IN (
                    SELECT id FROM ingest_runs ORDER BY id DESC LIMIT ?1
                )",
                params![MAX_RECORDED_RUNS as i64],
            )
            .context("Failed to prune ingest ledger")?;
        if pruned > 0 {
            tracing::debug!("Pruned {} old ingest runs", pruned);
        }

        tracing::info!(
            "Recorded ingest run {} ({} files, {} chunks)",
            id,
            run.files.len(),
            run.chunk_count
        );
        Ok(id)
    }

    /// 가장 최근 실행
    pub fn latest_run(&self) -> Result<Option<IngestRun>> {
        Ok(self.list_runs(1)?.into_iter().next())
    }

    /// 최근 실행 목록 (최신순)
    pub fn list_runs(&self, limit: usize) -> Result<Vec<IngestRun>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT id, files, char_count, chunk_count, backends, created_at
             FROM ingest_runs ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut runs = Vec::new();
        for row in rows {
            let (id, files, char_count, chunk_count, backends, created_at) = row?;
            runs.push(IngestRun {
                id,
                files: serde_json::from_str(&files).context("Corrupt files column")?,
                char_count: char_count as usize,
                chunk_count: chunk_count as usize,
                backends: serde_json::from_str(&backends).context("Corrupt backends column")?,
                created_at: parse_datetime(created_at),
            });
        }

        Ok(runs)
    }

    /// 모든 기록 삭제, 삭제한 행 수 반환
    pub fn clear(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let removed = conn
            .execute("DELETE FROM ingest_runs", [])
            .context("Failed to clear ingest ledger")?;
        Ok(removed)
    }
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_ledger() -> (TempDir, IngestLedger) {
        let dir = TempDir::new().unwrap();
        let ledger = IngestLedger::open_in(dir.path()).unwrap();
        (dir, ledger)
    }

    fn run(files: &[&str], chunk_count: usize) -> NewIngestRun {
        NewIngestRun {
            files: files.iter().map(|f| f.to_string()).collect(),
            char_count: 100,
            chunk_count,
            backends: Backend::ALL.to_vec(),
        }
    }

    #[test]
    fn test_record_and_latest() {
        let (_dir, ledger) = create_test_ledger();
        assert!(ledger.latest_run().unwrap().is_none());

        ledger.record_run(&run(&["a.pdf"], 1)).unwrap();
        let id = ledger.record_run(&run(&["b.pdf", "c.png"], 3)).unwrap();

        let latest = ledger.latest_run().unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.files, vec!["b.pdf", "c.png"]);
        assert_eq!(latest.chunk_count, 3);
        assert_eq!(latest.backends, vec![Backend::Gemini, Backend::Groq]);

        assert_eq!(ledger.list_runs(10).unwrap().len(), 2);
    }

    #[test]
    fn test_clear() {
        let (_dir, ledger) = create_test_ledger();
        ledger.record_run(&run(&["a.pdf"], 1)).unwrap();

        assert_eq!(ledger.clear().unwrap(), 1);
        assert!(ledger.latest_run().unwrap().is_none());
    }

    #[test]
    fn test_only_recent_runs_are_kept() {
        let (_dir, ledger) = create_test_ledger();
        let mut last = 0;
        for i in 0..MAX_RECORDED_RUNS + 5 {
            last = ledger.record_run(&run(&["a.pdf"], i)).unwrap();
        }

        let runs = ledger.list_runs(MAX_RECORDED_RUNS * 2).unwrap();
        assert_eq!(runs.len(), MAX_RECORDED_RUNS);
        assert_eq!(runs[0].id, last);
        assert_eq!(runs[MAX_RECORDED_RUNS - 1].chunk_count, 5);
    }

    #[test]
    fn test_open_existing_does_not_create() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("index");

        assert!(IngestLedger::open_existing_in(&root).unwrap().is_none());
        assert!(!root.join(LEDGER_FILE).exists());

        IngestLedger::open_in(&root)
            .unwrap()
            .record_run(&run(&["a.pdf"], 2))
            .unwrap();
        let ledger = IngestLedger::open_existing_in(&root).unwrap().unwrap();
        assert_eq!(ledger.db_path(), root.join(LEDGER_FILE));
        assert_eq!(ledger.latest_run().unwrap().unwrap().chunk_count, 2);
    }

    #[test]
    fn test_reopen_keeps_runs() {
        let dir = TempDir::new().unwrap();
        IngestLedger::open_in(dir.path())
            .unwrap()
            .record_run(&run(&["a.pdf"], 2))
            .unwrap();

        let reopened = IngestLedger::open_in(dir.path()).unwrap();
        assert_eq!(reopened.latest_run().unwrap().unwrap().chunk_count, 2);
    }
}
