//! CLI 모듈
//!
//! palank-reader 명령어 정의 및 실행. 서브커맨드 없이 플래그만 받는
//! 단일 "실행" 동작입니다.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::config::{AnalysisConfig, DEFAULT_MODEL};
use crate::gemini::{has_api_key, GeminiClient};
use crate::pipeline::BatchDriver;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "palank-reader")]
#[command(version, about = "PDF 책 지식 추출 및 요약 도구", long_about = None)]
pub struct Cli {
    /// 입력 PDF 디렉토리
    #[arg(long, default_value = "input_books")]
    pub input_dir: PathBuf,

    /// 출력 베이스 디렉토리
    #[arg(long, default_value = "book_analysis")]
    pub base_dir: PathBuf,

    /// 중간 요약 주기 (페이지 수, 0이면 비활성화)
    #[arg(long, default_value_t = 20)]
    pub interval: usize,

    /// 처리할 최대 페이지 수 (기본: 전체)
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Gemini 모델 이름
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// 시작 확인 프롬프트 건너뛰기
    #[arg(short = 'y', long)]
    pub yes: bool,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 실행
pub async fn run(cli: Cli) -> Result<()> {
    print_instructions(&cli);

    // 시작 확인 - 여기서 취소하면 아무 상태도 만들지 않고 종료
    if !cli.yes && !wait_for_enter()? {
        println!("[!] 사용자가 취소했습니다");
        return Ok(());
    }

    // API 키 확인
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }

    let config = AnalysisConfig {
        input_dir: cli.input_dir,
        base_dir: cli.base_dir,
        interval: interval_option(cli.interval),
        max_pages: cli.max_pages,
        model: cli.model,
    };

    // 디렉토리 준비 (기존 결과물은 유지)
    config.ensure_directories().context("디렉토리 생성 실패")?;

    let client = GeminiClient::from_env(&config.model).context("Gemini 클라이언트 생성 실패")?;
    tracing::info!("Using model: {}", config.model);

    let driver = BatchDriver::new(config, Arc::new(client));
    driver.run().await
}

/// 시작 안내 출력
fn print_instructions(cli: &Cli) {
    println!(
        r#"
PDF 책 분석 도구
---------------------------
1. PDF 파일을 {} 디렉토리에 넣으세요
2. 실행하면 다음을 수행합니다:
   - 책을 페이지 단위로 처리
   - 지식 포인트 추출 및 저장
   - 주기마다 중간 요약 생성 (주기: {})
   - 마지막에 최종 요약 생성

계속하려면 Enter, 종료하려면 Ctrl+C를 누르세요..."#,
        cli.input_dir.display(),
        if cli.interval == 0 {
            "비활성화".to_string()
        } else {
            format!("{} 페이지", cli.interval)
        },
    );
}

/// Enter 입력 대기
///
/// EOF(0 바이트)는 취소로 처리합니다.
fn wait_for_enter() -> Result<bool> {
    let mut line = String::new();
    let bytes = std::io::stdin()
        .read_line(&mut line)
        .context("표준 입력 읽기 실패")?;
    Ok(bytes > 0)
}

/// 주기 플래그 해석 (0 = 비활성화)
fn interval_option(interval: usize) -> Option<usize> {
    if interval == 0 {
        None
    } else {
        Some(interval)
    }
}

// ============================================================================
// Tests
// ============================================================================
