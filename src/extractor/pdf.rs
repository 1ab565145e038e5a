//! PDF 페이지별 텍스트 추출 모듈
//!
//! lopdf로 페이지 순서대로 네이티브 텍스트를 읽습니다.
//! 텍스트가 없는 페이지의 OCR 여부는 상위 모듈의 페이지 전략이 결정합니다.

use std::path::Path;

use anyhow::{Context, Result};
use lopdf::Document;

/// PDF 한 페이지의 네이티브 텍스트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfPage {
    /// 페이지 번호 (1부터 시작)
    pub number: u32,
    /// 네이티브 텍스트 (추출 실패 시 None)
    pub native_text: Option<String>,
}

/// PDF에서 페이지별 텍스트 추출
///
/// 페이지 번호 오름차순으로 반환합니다. 문서를 열 수 없으면 에러,
/// 개별 페이지 추출 실패는 `native_text: None`으로 기록합니다.
pub fn read_pdf_pages(path: &Path) -> Result<Vec<PdfPage>> {
    let doc = Document::load(path).with_context(|| format!("Failed to open PDF: {:?}", path))?;

    // get_pages는 BTreeMap이므로 이미 정렬됨
    let pages: Vec<PdfPage> = doc
        .get_pages()
        .keys()
        .map(|&number| {
            let native_text = match doc.extract_text(&[number]) {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::debug!("Native text failed on page {} of {:?}: {}", number, path, e);
                    None
                }
            };
            PdfPage {
                number,
                native_text,
            }
        })
        .collect();

    if pages.is_empty() {
        tracing::warn!("PDF has no pages: {:?}", path);
    }

    Ok(pages)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_pdf;
    use tempfile::TempDir;

    #[test]
    fn test_corrupt_pdf_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = read_pdf_pages(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to open PDF"));
    }

    #[test]
    fn test_missing_pdf_is_error() {
        assert!(read_pdf_pages(Path::new("/nonexistent/file.pdf")).is_err());
    }

    #[test]
    fn test_reads_native_text_per_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mixed.pdf");
        write_pdf(&path, &[Some("The capital of France is Paris."), None]).unwrap();

        let pages = read_pdf_pages(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[1].number, 2);

        let first = pages[0].native_text.as_deref().unwrap_or_default();
        assert!(first.contains("The capital of France is Paris."));
        let second = pages[1].native_text.as_deref().unwrap_or_default();
        assert!(second.trim().is_empty());
    }
}
