//! 페이지 분석 모듈
//!
//! 페이지 텍스트를 모델에 보내 학습 가능한 지식 포인트를 추출합니다.
//! 모델 응답은 `has_content` / `knowledge` 키를 가진 JSON 객체이며,
//! 코드 펜스로 감싸져 오거나 사소한 문법 오류를 포함할 수 있어
//! 관대한 파서(json5)로 처리합니다.

use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;

use crate::gemini::TextGenerator;
use crate::knowledge::KnowledgeItem;

// ============================================================================
// Page Analysis Result
// ============================================================================

/// 페이지 분석 결과
///
/// 파싱 실패 시 기본값(내용 없음, 빈 목록)으로 대체되어
/// 한 페이지의 오류가 배치 전체를 중단시키지 않습니다.
#[derive(Debug, Default, Deserialize)]
pub struct PageAnalysis {
    /// 페이지에 학습할 내용이 있는지 여부
    #[serde(default)]
    pub has_content: bool,
    /// 추출된 지식 포인트 목록
    #[serde(default)]
    pub knowledge: Vec<KnowledgeItem>,
}

/// 모델 응답 파싱 실패
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("empty model response")]
    Empty,
    #[error("invalid analysis JSON: {0}")]
    Json(#[from] json5::Error),
}

/// 코드 펜스 마커 제거
///
/// 모델이 JSON을 ```json ... ``` 블록으로 감싸 반환하는 경우가 있습니다.
fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "")
}

/// 모델 응답을 구조화된 분석 결과로 파싱
///
/// 펜스 제거 후 json5로 파싱합니다 (후행 쉼표, 따옴표 없는 키 허용).
pub fn parse_analysis(raw: &str) -> Result<PageAnalysis, ParseError> {
    let cleaned = strip_code_fences(raw);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(json5::from_str(cleaned)?)
}

// ============================================================================
// Page Analyzer
// ============================================================================

/// 페이지 분석기
pub struct PageAnalyzer {
    model: Arc<dyn TextGenerator>,
}

impl PageAnalyzer {
    /// 텍스트 생성기로 분석기 생성
    pub fn new(model: Arc<dyn TextGenerator>) -> Self {
        Self { model }
    }

    /// 페이지 하나 분석
    ///
    /// 파싱 실패는 내용 없는 페이지로 처리하고, 전송 오류는 호출자에게
    /// 전파합니다 (문서 단위 경계에서 처리).
    pub async fn analyze(&self, page_text: &str) -> Result<PageAnalysis> {
        let prompt = build_analysis_prompt(page_text);
        let raw = self.model.generate(&prompt).await?;
        tracing::debug!("Model response: {}", raw);

        match parse_analysis(&raw) {
            Ok(analysis) => {
                if analysis.has_content {
                    tracing::info!("Found {} new knowledge points", analysis.knowledge.len());
                } else {
                    tracing::info!("Skipping page (no relevant content)");
                }
                Ok(analysis)
            }
            Err(e) => {
                tracing::warn!("Failed to parse analysis response, skipping page: {}", e);
                Ok(PageAnalysis::default())
            }
        }
    }
}

/// 페이지 분석 프롬프트 구성
fn build_analysis_prompt(page_text: &str) -> String {
    format!(
        r#"Analyze this page as if you're studying from a book.

SKIP content if the page contains:
- Table of contents
- Chapter listings
- Index pages
- Blank pages
- Copyright information
- Publishing details
- References or bibliography
- Acknowledgments

DO extract knowledge if the page contains:
- Preface content that explains important concepts
- Actual educational content
- Key definitions and concepts
- Important arguments or theories
- Examples and case studies
- Significant findings or conclusions
- Methodologies or frameworks
- Critical analyses or interpretations

For valid content:
- Set has_content to true
- Extract detailed, learnable knowledge points
- Include important quotes or key statements
- Capture examples with their context
- Preserve technical terms and definitions

For pages to skip:
- Set has_content to false
- Return an empty knowledge list

Page text: {page_text}

Return a valid JSON object with the following keys:
- has_content (boolean): true if the page contains relevant content, false otherwise.
- knowledge (list): knowledge points extracted from the page. Empty if has_content is false.
Return only the JSON object, nothing else."#
    )
}

// ============================================================================
// Tests
// ============================================================================
