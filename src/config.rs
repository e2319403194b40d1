//! 분석 설정 모듈
//!
//! 배치 실행 전에 고정되는 설정값입니다. 전역 상수 대신 명시적인
//! 설정 객체로 드라이버에 전달됩니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// 기본 요약 주기 (페이지 수)
pub const DEFAULT_INTERVAL: usize = 20;

/// 기본 모델 이름
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";

/// 배치 분석 설정
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// 입력 PDF 디렉토리
    pub input_dir: PathBuf,
    /// 출력 베이스 디렉토리 (knowledge_bases/, summaries/ 하위 생성)
    pub base_dir: PathBuf,
    /// 요약 주기 (None이면 중간 요약 비활성화)
    pub interval: Option<usize>,
    /// 처리할 최대 페이지 수 (None이면 전체 처리)
    pub max_pages: Option<usize>,
    /// Gemini 모델 이름
    pub model: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input_books"),
            base_dir: PathBuf::from("book_analysis"),
            interval: Some(DEFAULT_INTERVAL),
            max_pages: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl AnalysisConfig {
    /// 지식베이스 디렉토리 경로
    pub fn knowledge_dir(&self) -> PathBuf {
        self.base_dir.join("knowledge_bases")
    }

    /// 요약 디렉토리 경로
    pub fn summaries_dir(&self) -> PathBuf {
        self.base_dir.join("summaries")
    }

    /// 필요한 디렉토리 생성
    ///
    /// 이전 실행의 결과물은 삭제하지 않습니다. 지식베이스 파일이 남아 있어야
    /// 중단 후 재시작 시 누적된 지식을 다시 불러올 수 있습니다.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.input_dir.clone(),
            self.knowledge_dir(),
            self.summaries_dir(),
        ] {
            create_dir(&dir)?;
        }
        Ok(())
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {:?}", dir))
}

// ============================================================================
// Tests
// ============================================================================
