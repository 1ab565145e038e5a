//! PDF 페이지 래스터화
//!
//! 네이티브 텍스트가 없는 페이지(스캔본)를 OCR에 넘기기 위해
//! 한 페이지를 PNG로 렌더링합니다.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::ocr::RasterImage;
use crate::error::PipelineError;

/// 페이지 래스터화 트레이트
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// `page_number`(1부터)번 페이지를 이미지로 렌더링
    async fn rasterize(&self, pdf: &Path, page_number: u32) -> Result<RasterImage>;
}

/// poppler `pdftoppm` 기반 래스터화
pub struct PdftoppmRasterizer {
    command: String,
    dpi: u32,
}

impl PdftoppmRasterizer {
    /// # Arguments
    /// * `command` - pdftoppm 실행 파일
    /// * `dpi` - 렌더링 해상도 (72 = 문서 원본 해상도)
    pub fn new(command: impl Into<String>, dpi: u32) -> Self {
        Self {
            command: command.into(),
            dpi,
        }
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, pdf: &Path, page_number: u32) -> Result<RasterImage> {
        let out_dir = tempfile::tempdir().context("Failed to create raster temp dir")?;
        let out_root = out_dir.path().join("page");
        let page = page_number.to_string();

        let output = tokio::process::Command::new(&self.command)
            .args(["-f", &page, "-l", &page])
            .args(["-r", &self.dpi.to_string()])
            .args(["-png", "-singlefile"])
            .arg(pdf)
            .arg(&out_root)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run '{}'. Is poppler installed?", self.command))?;

        if !output.status.success() {
            return Err(PipelineError::service(
                "pdftoppm",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )
            .into());
        }

        // -singlefile → <root>.png
        let png_path = out_root.with_extension("png");
        let data = tokio::fs::read(&png_path)
            .await
            .with_context(|| format!("Rendered page {} not found: {:?}", page_number, png_path))?;

        tracing::debug!(
            "Rasterized page {} of {:?} ({} bytes)",
            page_number,
            pdf,
            data.len()
        );

        Ok(RasterImage::new(data, "image/png"))
    }
}
