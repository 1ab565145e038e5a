//! 입력 파일 수집 모듈
//!
//! CLI에서 받은 경로를 처리 대상 문서 목록으로 바꿉니다.
//! 파일은 주어진 순서 그대로, 폴더는 .gitignore를 존중하며
//! 지원 확장자만 경로순으로 펼칩니다.

use std::path::{Path, PathBuf};

use anyhow::Result;
use ignore::WalkBuilder;

// ============================================================================
// Document Kind
// ============================================================================

/// 문서 종류 (`.pdf` → Pdf, 그 외 → Image)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// PDF 문서 (페이지별 텍스트 + OCR 폴백)
    Pdf,
    /// 이미지 (OCR 전용)
    Image,
}

/// 폴더 수집 시 포함하는 이미지 확장자
const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "webp", "gif", "bmp", "tif", "tiff"];

impl DocumentKind {
    /// 파일 경로에서 종류 결정
    pub fn from_path(path: &Path) -> Self {
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf {
            DocumentKind::Pdf
        } else {
            DocumentKind::Image
        }
    }

    /// 폴더 수집 대상 확장자인지
    fn is_collectable(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                ext.eq_ignore_ascii_case("pdf")
                    || IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e))
            })
            .unwrap_or(false)
    }
}

/// 처리 대상 문서
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub kind: DocumentKind,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = DocumentKind::from_path(&path);
        Self { path, kind }
    }
}

// ============================================================================
// File Collector
// ============================================================================

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 50 * 1024 * 1024, // 50MB
        }
    }
}

/// 파일 수집기
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 수집기 생성
    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 입력 경로들을 문서 목록으로 변환
    ///
    /// 파일 경로는 검사 없이 그대로 포함합니다 (읽기 실패는 추출 단계에서 기록).
    pub fn collect(&self, inputs: &[PathBuf]) -> Result<Vec<SourceDocument>> {
        let mut documents = Vec::new();
        for input in inputs {
            if input.is_dir() {
                documents.extend(self.collect_directory(input)?);
            } else {
                documents.push(SourceDocument::new(input.clone()));
            }
        }
        Ok(documents)
    }

    /// 폴더 재귀 수집 (경로순 정렬)
    pub fn collect_directory(&self, path: &Path) -> Result<Vec<SourceDocument>> {
        if !path.is_dir() {
            anyhow::bail!("Not a directory: {:?}", path);
        }

        let walker = WalkBuilder::new(path)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .build();

        let mut paths = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            let file_path = entry.path();
            if !DocumentKind::is_collectable(file_path) {
                continue;
            }

            if self.config.max_file_size > 0 {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                if size > self.config.max_file_size {
                    tracing::debug!("Skipping large file: {:?} ({} bytes)", file_path, size);
                    continue;
                }
            }

            paths.push(file_path.to_path_buf());
        }

        paths.sort();
        tracing::info!("Collected {} files from {:?}", paths.len(), path);

        Ok(paths.into_iter().map(SourceDocument::new).collect())
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// 수집 통계
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub total_files: usize,
    pub pdf_files: usize,
    pub image_files: usize,
}

impl CollectionStats {
    pub fn from_documents(documents: &[SourceDocument]) -> Self {
        let mut stats = Self::default();
        for doc in documents {
            stats.total_files += 1;
            match doc.kind {
                DocumentKind::Pdf => stats.pdf_files += 1,
                DocumentKind::Image => stats.image_files += 1,
            }
        }
        stats
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_document_kind_from_path() {
        assert_eq!(DocumentKind::from_path(Path::new("a.pdf")), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_path(Path::new("A.PDF")), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_path(Path::new("scan.png")), DocumentKind::Image);
        // 확장자가 pdf가 아니면 모두 이미지 경로
        assert_eq!(DocumentKind::from_path(Path::new("notes")), DocumentKind::Image);
    }

    #[test]
    fn test_collect_keeps_file_order() {
        let inputs = vec![PathBuf::from("b.png"), PathBuf::from("a.pdf")];
        let docs = FileCollector::with_defaults().collect(&inputs).unwrap();
        assert_eq!(docs[0].path, PathBuf::from("b.png"));
        assert_eq!(docs[1].kind, DocumentKind::Pdf);
    }

    #[test]
    fn test_collect_directory_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("a.png"), b"png").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();

        let docs = FileCollector::with_defaults()
            .collect(&[dir.path().to_path_buf()])
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert!(docs[0].path.ends_with("a.png"));
        assert!(docs[1].path.ends_with("b.pdf"));

        let stats = CollectionStats::from_documents(&docs);
        assert_eq!(stats.pdf_files, 1);
        assert_eq!(stats.image_files, 1);
    }
}
