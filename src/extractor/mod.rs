//! PDF 입력 모듈
//!
//! 입력 디렉토리에서 PDF 파일을 찾고 페이지별 텍스트를 추출합니다.
//! 파일명이 그대로 문서 식별자로 쓰입니다.

pub mod pdf;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// 입력 디렉토리의 PDF 파일 목록 (이름순 정렬)
///
/// PDF가 아닌 파일과 하위 디렉토리는 무시합니다.
pub fn list_pdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory: {:?}", dir))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_pdf(path))
        .collect();

    files.sort();
    Ok(files)
}

/// 확장자가 pdf인지 (대소문자 무시)
fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// PDF에서 페이지별 텍스트 추출
///
/// 추출은 CPU 바운드이므로 spawn_blocking으로 실행합니다.
pub async fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || pdf::extract_pages(&path))
        .await
        .context("PDF extraction task failed")?
}

// ============================================================================
// Tests
// ============================================================================
