//! 요약 모듈
//!
//! 누적된 지식베이스를 모델에 보내 마크다운 요약을 생성하고,
//! 번호가 매겨진 요약 파일로 저장합니다.
//! 저장 위치: `<base_dir>/summaries/<문서명>_<interval|final>_NNN.md`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::gemini::TextGenerator;
use crate::knowledge::{doc_stem, KnowledgeItem};

/// 요약에 포함할 항목의 최대 단어 수
///
/// 지나치게 장황한 항목을 제외해 프롬프트 크기를 제한합니다.
pub const MAX_SUMMARY_WORDS: usize = 50;

// ============================================================================
// Filtering
// ============================================================================

/// 요약 대상 항목 필터링
///
/// 텍스트 내용이 [`MAX_SUMMARY_WORDS`] 단어 이하인 항목만 통과합니다.
pub fn filter_for_summary(items: &[KnowledgeItem]) -> Vec<&KnowledgeItem> {
    items
        .iter()
        .filter(|item| item.word_count() <= MAX_SUMMARY_WORDS)
        .collect()
}

// ============================================================================
// Summarizer
// ============================================================================

/// 지식베이스 요약 생성기
pub struct Summarizer {
    model: Arc<dyn TextGenerator>,
}

impl Summarizer {
    /// 텍스트 생성기로 요약기 생성
    pub fn new(model: Arc<dyn TextGenerator>) -> Self {
        Self { model }
    }

    /// 지식 항목 목록을 마크다운 요약으로 합성
    ///
    /// 필터링 후 항목이 없으면 모델을 호출하지 않고 빈 문자열을 반환합니다.
    /// 요청 실패도 빈 문자열로 처리합니다. 호출자는 빈 출력을
    /// "저장할 것이 없음"으로 취급해야 하며 오류로 전파하면 안 됩니다.
    pub async fn summarize(&self, items: &[KnowledgeItem]) -> String {
        let filtered = filter_for_summary(items);
        if filtered.is_empty() {
            tracing::info!("Skipping summary: no knowledge points within word limit");
            return String::new();
        }

        let prompt = build_summary_prompt(&filtered);

        match self.model.generate(&prompt).await {
            Ok(markdown) => {
                tracing::info!("Summary generated ({} chars)", markdown.len());
                markdown
            }
            Err(e) => {
                tracing::error!("Failed to generate summary: {}", e);
                String::new()
            }
        }
    }
}

/// 요약 프롬프트 구성
fn build_summary_prompt(items: &[&KnowledgeItem]) -> String {
    let content: Vec<&str> = items.iter().map(|item| item.content()).collect();

    format!(
        r#"Create a comprehensive summary of the provided content in a concise but detailed way, using markdown format.

Use markdown formatting:
- ## for main sections
- ### for subsections
- Bullet points for lists
- `code blocks` for any code or formulas
- **bold** for emphasis
- *italic* for terminology
- > blockquotes for important notes

Return only the markdown summary, nothing else. Do not say 'here is the summary' or anything like that before or after.

Analyze this content:
{}

Return only the markdown summary, nothing else. Do not include any JSON."#,
        content.join("\n")
    )
}

// ============================================================================
// Summary Writer
// ============================================================================

/// 요약 파일 작성기
///
/// 파일명의 순번은 같은 패턴의 기존 파일 수로 결정됩니다. 단일 프로세스
/// 순차 실행을 가정하며, 여러 프로세스가 동시에 쓰면 경합이 생길 수 있습니다.
pub struct SummaryWriter {
    dir: PathBuf,
}

impl SummaryWriter {
    /// 요약 디렉토리로 작성기 생성
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// 요약을 새 번호의 마크다운 파일로 저장
    ///
    /// 빈 요약이면 아무것도 쓰지 않고 `None`을 반환합니다.
    /// 기존 번호 파일은 절대 덮어쓰지 않습니다.
    pub fn write(&self, summary: &str, is_final: bool, doc_name: &str) -> Result<Option<PathBuf>> {
        if summary.trim().is_empty() {
            tracing::info!("Skipping summary save: no content to save");
            return Ok(None);
        }

        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).context("Failed to create summaries directory")?;
        }

        let tag = if is_final { "final" } else { "interval" };
        let prefix = format!("{}_{}_", doc_stem(doc_name), tag);

        let mut next_number = count_matching_files(&self.dir, &prefix)? + 1;
        let mut path = self.dir.join(format!("{}{:03}.md", prefix, next_number));

        // 번호에 빈 자리가 있어도 기존 파일은 덮어쓰지 않음
        while path.exists() {
            next_number += 1;
            path = self.dir.join(format!("{}{:03}.md", prefix, next_number));
        }

        let content = render_summary_file(doc_name, summary);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write summary: {:?}", path))?;

        tracing::info!("Saved {} summary to {:?}", tag, path);
        Ok(Some(path))
    }
}

/// `<prefix>*.md` 패턴의 기존 파일 수
fn count_matching_files(dir: &Path, prefix: &str) -> Result<usize> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read summaries directory: {:?}", dir))?;

    let count = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(prefix) && name.ends_with(".md"))
                .unwrap_or(false)
        })
        .count();

    Ok(count)
}

/// 요약 파일 본문 렌더링 (헤더 + 본문 + 푸터)
fn render_summary_file(doc_name: &str, summary: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    format!(
        "# Book Analysis: {}\nGenerated on: {}\n\n{}\n\n---\n*Analysis generated by palank-reader*\n",
        doc_name, timestamp, summary
    )
}

// ============================================================================
// Tests
// ============================================================================
