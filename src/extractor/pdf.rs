//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트로 전체 텍스트를 추출한 뒤 페이지 단위로 분리합니다.

use std::path::Path;

use anyhow::{Context, Result};

/// PDF에서 페이지별 텍스트 추출
///
/// 페이지 순서대로 텍스트 목록을 반환합니다. 항상 최소 한 페이지를
/// 반환하며, 스캔 문서처럼 텍스트가 전혀 없으면 빈 페이지 하나입니다.
pub fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![String::new()]);
    }

    Ok(split_pages(&text))
}

/// PDF 텍스트를 페이지별로 분리
fn split_pages(text: &str) -> Vec<String> {
    // 폼피드 문자 (\x0c)로 페이지 분리 시도
    let pages: Vec<String> = text
        .split('\x0c')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if pages.len() > 1 {
        return pages;
    }

    // 페이지 구분자 패턴으로 시도 (일부 PDF에서 사용)
    // 예: "--- Page 1 ---" 또는 숫자만 있는 줄
    let page_pattern = regex::Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$")
        .expect("Invalid regex");

    if page_pattern.is_match(text) {
        let pages: Vec<String> = page_pattern
            .split(text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if pages.len() > 1 {
            return pages;
        }
    }

    // 분리 실패 - 전체를 하나의 페이지로
    vec![text.to_string()]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pages_with_formfeed() {
        let text = "Page 1 content\x0cPage 2 content\x0cPage 3 content";
        let pages = split_pages(text);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "Page 1 content");
        assert_eq!(pages[1], "Page 2 content");
    }

    #[test]
    fn test_split_pages_with_separator_lines() {
        let text = "intro text\n--- Page 1 ---\nfirst page\n--- Page 2 ---\nsecond page";
        let pages = split_pages(text);
        assert!(pages.len() > 1);
    }

    #[test]
    fn test_split_pages_no_separator() {
        let text = "Just some text without page breaks";
        let pages = split_pages(text);
        assert_eq!(pages.len(), 1);
    }
}
