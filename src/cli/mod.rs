//! CLI 모듈
//!
//! docchat-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::backend::Backend;
use crate::config::PipelineConfig;
use crate::error::{classify, PipelineError};
use crate::knowledge::{IndexLayout, IngestLedger};
use crate::pipeline::{DocumentPipeline, ProcessOutcome};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "docchat-rag")]
#[command(version, about = "PDF/이미지 문서 질의응답 RAG", long_about = None)]
pub struct Cli {
    /// 인덱스 루트 디렉토리 (DOCCHAT_INDEX_DIR 대신 사용)
    #[arg(long, global = true)]
    pub index_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 파일 또는 폴더를 처리해 두 백엔드 인덱스를 다시 만듦
    Process {
        /// PDF, 이미지 파일 또는 폴더
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// 처리된 문서에 질문
    Ask {
        /// 질문
        question: String,

        /// 사용할 백엔드 (gemini, groq)
        #[arg(short, long, default_value = "gemini")]
        model: String,

        /// 답변에 사용한 청크 표시
        #[arg(long)]
        sources: bool,
    },

    /// 인덱스와 처리 기록 삭제
    Clear,

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = PipelineConfig::from_env().context("설정 로드 실패")?;
    if let Some(dir) = cli.index_dir {
        config.index_root = dir;
    }

    match cli.command {
        Commands::Process { paths } => cmd_process(&config, &paths).await,
        Commands::Ask {
            question,
            model,
            sources,
        } => cmd_ask(&config, &question, &model, sources).await,
        Commands::Clear => cmd_clear(&config).await,
        Commands::Status => cmd_status(&config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 문서 처리 명령어 (process)
async fn cmd_process(config: &PipelineConfig, paths: &[PathBuf]) -> Result<()> {
    // 인제스트는 gemini 임베딩을 항상 만들기 때문에 키가 먼저 필요
    if let Err(e) = config.require_gemini_key() {
        println!("[!] {}", e);
        return Err(e.into());
    }

    let pipeline = DocumentPipeline::from_config(config)?;

    println!("[*] {} 개 경로 처리 중...", paths.len());
    let outcome = pipeline
        .process_files(paths)
        .await
        .context("문서 처리 실패")?;

    let extraction = outcome.extraction();
    println!(
        "    파일: 성공 {}, 실패 {}",
        extraction.files_ok, extraction.files_failed
    );
    println!(
        "    페이지: 텍스트 {}, OCR {}, 빈 페이지 {}",
        extraction.pages_native, extraction.pages_ocr, extraction.pages_empty
    );

    match outcome {
        ProcessOutcome::Indexed {
            run_id,
            char_count,
            chunk_count,
            ref indices,
            ..
        } => {
            println!("[OK] {}", outcome);
            println!("     {} 문자 → {} 청크 (기록 #{})", char_count, chunk_count, run_id);
            for summary in indices {
                println!(
                    "     {}: {} 벡터, {}차원 ({})",
                    summary.backend,
                    summary.chunk_count,
                    summary.dimension,
                    summary.path.display()
                );
            }
        }
        _ => println!("[!] {}", outcome),
    }

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(config: &PipelineConfig, question: &str, model: &str, sources: bool) -> Result<()> {
    let backend: Backend = model.parse()?;
    let pipeline = DocumentPipeline::from_config(config)?;

    println!("[*] {} 백엔드로 질문 중: \"{}\"", backend, question);

    let answer = match pipeline.ask_with_sources(question, backend).await {
        Ok(answer) => answer,
        Err(e) => {
            if let Some(PipelineError::IndexNotFound { .. }) = classify(&e) {
                println!("[!] 인덱스가 없습니다. 먼저 `docchat-rag process <파일>`을 실행하세요.");
            }
            return Err(e);
        }
    };

    println!();
    println!("{}", answer.text.trim_end());

    if sources {
        println!();
        println!("[OK] 참고한 청크 ({} 건):", answer.sources.len());
        for (i, source) in answer.sources.iter().enumerate() {
            println!(
                "{}. [#{}] [유사도: {:.4}] {}",
                i + 1,
                source.chunk_index,
                source.similarity,
                truncate_text(&source.chunk_text, 200)
            );
        }
    }

    Ok(())
}

/// 삭제 명령어 (clear)
///
/// 임베딩이나 채팅 모델 없이 디스크의 인덱스와 기록만 지웁니다.
async fn cmd_clear(config: &PipelineConfig) -> Result<()> {
    let layout = IndexLayout::new(config.index_root.clone());
    let removed = layout.clear().await.context("인덱스 삭제 실패")?;

    if let Some(ledger) = IngestLedger::open_existing_in(&config.index_root)? {
        ledger.clear().context("처리 기록 삭제 실패")?;
    }

    if removed == 0 {
        println!("[!] 삭제할 인덱스가 없습니다.");
    } else {
        println!("[OK] 인덱스 {} 개와 처리 기록을 삭제했습니다.", removed);
    }

    Ok(())
}

/// 상태 명령어 (status)
///
/// 인덱스 루트에 아무것도 만들지 않습니다.
async fn cmd_status(config: &PipelineConfig) -> Result<()> {
    println!("docchat-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 인덱스 디렉토리: {}", config.index_root.display());
    println!(
        "[*] 청크: 최대 {} 문자, 오버랩 {} 문자, top-k {}",
        config.chunk.max_characters, config.chunk.overlap_characters, config.top_k
    );

    // API 키 상태
    match config.require_gemini_key() {
        Ok(_) => println!("[OK] Gemini API 키: 설정됨"),
        Err(_) => println!("[!] Gemini API 키: 미설정 (export GEMINI_API_KEY=your-key)"),
    }
    match config.require_groq_key() {
        Ok(_) => println!("[OK] Groq API 키: 설정됨"),
        Err(_) => println!("[!] Groq API 키: 미설정 (export GROQ_API_KEY=your-key)"),
    }

    let layout = IndexLayout::new(config.index_root.clone());
    for backend in Backend::ALL {
        match layout.indexed_chunks(backend).await {
            Ok(Some(count)) => {
                let path = layout.path_for(backend);
                println!(
                    "[OK] {} 인덱스: {} 청크 ({})",
                    backend,
                    count,
                    format_bytes(dir_size(&path) as usize)
                );
            }
            Ok(None) => println!("[!] {} 인덱스: 없음", backend),
            Err(e) => println!("[!] {} 인덱스 조회 실패: {}", backend, e),
        }
    }

    let ledger = match IngestLedger::open_existing_in(&config.index_root) {
        Ok(Some(ledger)) => ledger,
        Ok(None) => {
            println!("[!] 처리 기록이 없습니다.");
            return Ok(());
        }
        Err(e) => {
            tracing::debug!("처리 기록 열기 실패: {}", e);
            return Ok(());
        }
    };

    match ledger.latest_run() {
        Ok(Some(run)) => {
            println!(
                "[OK] 마지막 처리: #{} {} | {} 파일, {} 청크 ({})",
                run.id,
                run.created_at.format("%Y-%m-%d %H:%M"),
                run.files.len(),
                run.chunk_count,
                ledger.db_path().display()
            );
            for file in &run.files {
                println!("     {}", truncate_text(file, 80));
            }
        }
        Ok(None) => println!("[!] 처리 기록이 없습니다."),
        Err(e) => tracing::debug!("처리 기록 조회 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// 디렉토리 전체 크기 (읽을 수 없는 항목은 무시)
fn dir_size(path: &std::path::Path) -> u64 {
    ignore::WalkBuilder::new(path)
        .hidden(false)
        .git_ignore(false)
        .build()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.metadata().ok())
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .sum()
}

// ============================================================================
// Tests
// ============================================================================
