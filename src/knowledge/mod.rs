//! Knowledge 모듈 - 문서별 지식베이스 저장소
//!
//! 페이지 분석으로 추출된 지식 포인트를 문서별 JSON 파일에 누적 저장합니다.
//! 저장 위치: `<base_dir>/knowledge_bases/<문서명>_knowledge.json`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 지식 항목 하나
///
/// 모델이 반환하는 항목은 순수 문자열이거나 `point` 필드를 가진 객체입니다.
/// 두 형태를 모두 그대로 보존합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KnowledgeItem {
    /// 순수 문자열 항목
    Text(String),
    /// 구조화된 항목 (`point` + 부가 필드)
    Record {
        #[serde(default)]
        point: String,
        #[serde(flatten)]
        extra: serde_json::Map<String, serde_json::Value>,
    },
}

impl KnowledgeItem {
    /// 항목의 텍스트 내용
    ///
    /// 문자열 항목은 자기 자신, 구조화 항목은 `point` 필드입니다.
    pub fn content(&self) -> &str {
        match self {
            KnowledgeItem::Text(text) => text,
            KnowledgeItem::Record { point, .. } => point,
        }
    }

    /// 내용의 단어 수 (공백 기준)
    pub fn word_count(&self) -> usize {
        self.content().split_whitespace().count()
    }
}

/// 문서 하나의 지식베이스
///
/// 항목 순서가 곧 식별자입니다. 중복 제거는 하지 않으며, 중단 후 재시작하여
/// 같은 페이지를 다시 처리하면 항목이 중복 누적될 수 있습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeBase {
    #[serde(default)]
    pub knowledge: Vec<KnowledgeItem>,
}

impl KnowledgeBase {
    /// 항목 수
    pub fn len(&self) -> usize {
        self.knowledge.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.knowledge.is_empty()
    }

    /// 항목 추가 (순서 유지)
    pub fn append(&mut self, items: Vec<KnowledgeItem>) {
        self.knowledge.extend(items);
    }
}

// ============================================================================
// KnowledgeStore
// ============================================================================

/// 문서별 지식베이스 파일 저장소
pub struct KnowledgeStore {
    dir: PathBuf,
}

impl KnowledgeStore {
    /// 지식베이스 디렉토리로 저장소 생성
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// 문서의 지식베이스 파일 경로
    pub fn knowledge_path(&self, doc_name: &str) -> PathBuf {
        self.dir.join(format!("{}_knowledge.json", doc_stem(doc_name)))
    }

    /// 지식베이스 로드 (파일이 없으면 빈 베이스)
    pub fn load(&self, doc_name: &str) -> Result<KnowledgeBase> {
        let path = self.knowledge_path(doc_name);
        if !path.exists() {
            tracing::debug!("No existing knowledge base for {}", doc_name);
            return Ok(KnowledgeBase::default());
        }

        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read knowledge base: {:?}", path))?;
        let base: KnowledgeBase = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse knowledge base: {:?}", path))?;

        tracing::info!("Loaded {} knowledge points for {}", base.len(), doc_name);
        Ok(base)
    }

    /// 지식베이스 저장 (전체 덮어쓰기)
    ///
    /// 매 페이지 처리 후 호출되어야 합니다. 파일은 항상 마지막으로 완료된
    /// 페이지까지의 전체 누적 상태를 담습니다.
    pub fn save(&self, doc_name: &str, base: &KnowledgeBase) -> Result<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)
                .context("Failed to create knowledge base directory")?;
        }

        let path = self.knowledge_path(doc_name);
        let json = serde_json::to_string_pretty(base)
            .context("Failed to serialize knowledge base")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write knowledge base: {:?}", path))?;

        tracing::debug!("Saved knowledge base ({} items) to {:?}", base.len(), path);
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 문서명에서 `.pdf` 확장자 제거
pub fn doc_stem(doc_name: &str) -> &str {
    doc_name.strip_suffix(".pdf").unwrap_or(doc_name)
}

// ============================================================================
// Tests
// ============================================================================
