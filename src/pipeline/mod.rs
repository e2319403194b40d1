//! 배치 파이프라인 모듈
//!
//! 문서 → 페이지 순회의 전체 흐름을 담당합니다. 페이지마다
//! 분석 → 누적 → 저장을 반복하고, 설정된 주기마다 중간 요약을,
//! 마지막 페이지에서 최종 요약을 생성합니다.
//!
//! 엄격한 순차 처리입니다. 한 번에 한 페이지, 한 문서만 다루며
//! 모델 호출이 끝날 때까지 다음 단계로 넘어가지 않습니다.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::analyzer::PageAnalyzer;
use crate::config::AnalysisConfig;
use crate::extractor;
use crate::gemini::TextGenerator;
use crate::knowledge::KnowledgeStore;
use crate::summary::{Summarizer, SummaryWriter};

// ============================================================================
// Batch Driver
// ============================================================================

/// 배치 드라이버
pub struct BatchDriver {
    config: AnalysisConfig,
    store: KnowledgeStore,
    analyzer: PageAnalyzer,
    summarizer: Summarizer,
    writer: SummaryWriter,
}

impl BatchDriver {
    /// 설정과 텍스트 생성기로 드라이버 생성
    pub fn new(config: AnalysisConfig, model: Arc<dyn TextGenerator>) -> Self {
        let store = KnowledgeStore::new(config.knowledge_dir());
        let analyzer = PageAnalyzer::new(model.clone());
        let summarizer = Summarizer::new(model);
        let writer = SummaryWriter::new(config.summaries_dir());

        Self {
            config,
            store,
            analyzer,
            summarizer,
            writer,
        }
    }

    /// 입력 디렉토리의 모든 PDF 처리
    ///
    /// 문서 하나의 실패는 기록하고 다음 문서로 넘어갑니다.
    /// 배치 전체를 중단시키는 것은 초기 설정 오류뿐입니다.
    pub async fn run(&self) -> Result<()> {
        let pdf_files = extractor::list_pdf_files(&self.config.input_dir)?;

        if pdf_files.is_empty() {
            println!(
                "[!] 입력 디렉토리에 PDF 파일이 없습니다: {}",
                self.config.input_dir.display()
            );
            return Ok(());
        }

        println!("[*] 처리 대상: {} 권", pdf_files.len());

        for pdf_path in &pdf_files {
            let doc_name = document_name(pdf_path);
            println!("\n[*] 책 처리 시작: {}", doc_name);

            match self.process_pdf(pdf_path, &doc_name).await {
                Ok(()) => {
                    println!("[OK] {} 처리 완료", doc_name);
                }
                Err(e) => {
                    tracing::error!("Error processing {}: {:#}", doc_name, e);
                    println!("[!] {} 처리 실패: {}", doc_name, e);
                    continue;
                }
            }
        }

        println!("\n[OK] 전체 처리 완료");
        Ok(())
    }

    /// PDF 하나 처리 (페이지 추출 후 문서 처리)
    async fn process_pdf(&self, path: &Path, doc_name: &str) -> Result<()> {
        let pages = extractor::extract_pages(path).await?;
        self.process_document(doc_name, &pages).await
    }

    /// 추출된 페이지들로 문서 하나 처리
    ///
    /// 지식베이스는 페이지마다 통째로 다시 저장됩니다. 중단 시 잃는 것은
    /// 진행 중이던 페이지뿐이고, 재시작하면 저장된 베이스를 다시 불러와
    /// 처음부터 재처리합니다 (재처리된 페이지의 항목은 중복 누적됨).
    pub async fn process_document(&self, doc_name: &str, pages: &[String]) -> Result<()> {
        let mut base = self.store.load(doc_name)?;
        if !base.is_empty() {
            println!("[*] 기존 지식 {} 개 로드됨", base.len());
        }

        let total = match self.config.max_pages {
            Some(limit) => pages.len().min(limit),
            None => pages.len(),
        };

        if total == 0 {
            println!("[!] 처리할 페이지가 없습니다");
            return Ok(());
        }

        println!("[*] {} 페이지 처리 예정", total);

        for (index, page_text) in pages.iter().take(total).enumerate() {
            let page_number = index + 1;
            println!("[*] 페이지 {}/{} 분석 중...", page_number, total);

            let analysis = self.analyzer.analyze(page_text).await?;
            if analysis.has_content {
                base.append(analysis.knowledge);
            }

            // 페이지마다 전체 누적 상태를 저장
            self.store.save(doc_name, &base)?;

            let is_last_page = page_number == total;

            // 주기 도달 시 중간 요약 (마지막 페이지는 최종 요약이 대신함)
            if let Some(interval) = self.config.interval {
                if interval > 0 && page_number % interval == 0 && !is_last_page {
                    println!("[*] 중간 요약 생성 중... ({}/{} 페이지)", page_number, total);
                    let summary = self.summarizer.summarize(&base.knowledge).await;
                    self.writer.write(&summary, false, doc_name)?;
                }
            }

            // 마지막 페이지에서는 항상 최종 요약
            if is_last_page {
                println!("[*] 최종 요약 생성 중... ({} 페이지 완료)", page_number);
                let summary = self.summarizer.summarize(&base.knowledge).await;
                self.writer.write(&summary, true, doc_name)?;
            }
        }

        println!("[OK] 누적 지식 {} 개", base.len());
        Ok(())
    }
}

/// 경로에서 문서 이름 (파일명 그대로)
fn document_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.pdf")
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::mock::ScriptedGenerator;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir, interval: Option<usize>, max_pages: Option<usize>) -> AnalysisConfig {
        AnalysisConfig {
            input_dir: dir.path().join("input_books"),
            base_dir: dir.path().join("book_analysis"),
            interval,
            max_pages,
            model: "scripted".to_string(),
        }
    }

    fn content_response(point: &str) -> String {
        format!(r#"{{"has_content": true, "knowledge": ["{}"]}}"#, point)
    }

    const EMPTY_RESPONSE: &str = r#"{"has_content": false, "knowledge": []}"#;

    fn pages(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("page {} text", i)).collect()
    }

    fn count_files(dir: &std::path::Path, tag: &str) -> usize {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| {
                    e.file_name()
                        .to_str()
                        .map(|n| n.contains(tag))
                        .unwrap_or(false)
                })
                .count(),
            Err(_) => 0,
        }
    }

    #[tokio::test]
    async fn test_25_pages_interval_20_one_interval_one_final() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, Some(20), None);

        // 호출 순서: 분석 20회 → 중간 요약 → 분석 5회 → 최종 요약
        let mut script: Vec<Result<String, String>> = Vec::new();
        for i in 1..=20 {
            script.push(Ok(content_response(&format!("fact {}", i))));
        }
        script.push(Ok("## Interval summary".to_string()));
        for i in 21..=25 {
            script.push(Ok(content_response(&format!("fact {}", i))));
        }
        script.push(Ok("## Final summary".to_string()));

        let model = Arc::new(ScriptedGenerator::new(script));
        let driver = BatchDriver::new(config.clone(), model.clone());

        driver.process_document("book.pdf", &pages(25)).await.unwrap();

        assert_eq!(model.call_count(), 27);
        assert_eq!(count_files(&config.summaries_dir(), "_interval_"), 1);
        assert_eq!(count_files(&config.summaries_dir(), "_final_"), 1);

        let store = KnowledgeStore::new(config.knowledge_dir());
        assert_eq!(store.load("book.pdf").unwrap().len(), 25);
    }

    #[tokio::test]
    async fn test_no_content_pages_leave_base_empty_and_skip_summary() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, Some(20), None);

        let model = Arc::new(ScriptedGenerator::repeating(EMPTY_RESPONSE));
        let driver = BatchDriver::new(config.clone(), model.clone());

        driver.process_document("book.pdf", &pages(3)).await.unwrap();

        // 분석 3회만 호출됨 - 필터 결과가 비어 최종 요약 호출은 생략
        assert_eq!(model.call_count(), 3);
        assert_eq!(count_files(&config.summaries_dir(), ".md"), 0);

        let store = KnowledgeStore::new(config.knowledge_dir());
        let base = store.load("book.pdf").unwrap();
        assert!(base.is_empty());
        // 지식 파일 자체는 페이지마다 저장됨
        assert!(store.knowledge_path("book.pdf").exists());
    }

    #[tokio::test]
    async fn test_unparsable_responses_leave_base_unchanged() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, None, None);

        let model = Arc::new(ScriptedGenerator::repeating("sorry, no JSON here"));
        let driver = BatchDriver::new(config.clone(), model);

        driver.process_document("book.pdf", &pages(4)).await.unwrap();

        let store = KnowledgeStore::new(config.knowledge_dir());
        assert!(store.load("book.pdf").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_interval_disabled_writes_only_final() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, None, None);

        let mut script: Vec<Result<String, String>> = Vec::new();
        for i in 1..=5 {
            script.push(Ok(content_response(&format!("fact {}", i))));
        }
        script.push(Ok("## Final".to_string()));

        let model = Arc::new(ScriptedGenerator::new(script));
        let driver = BatchDriver::new(config.clone(), model.clone());

        driver.process_document("book.pdf", &pages(5)).await.unwrap();

        assert_eq!(model.call_count(), 6);
        assert_eq!(count_files(&config.summaries_dir(), "_interval_"), 0);
        assert_eq!(count_files(&config.summaries_dir(), "_final_"), 1);
    }

    #[tokio::test]
    async fn test_interval_on_last_page_yields_final_only() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, Some(20), None);

        let mut script: Vec<Result<String, String>> = Vec::new();
        for i in 1..=20 {
            script.push(Ok(content_response(&format!("fact {}", i))));
        }
        script.push(Ok("## Final".to_string()));

        let model = Arc::new(ScriptedGenerator::new(script));
        let driver = BatchDriver::new(config.clone(), model.clone());

        driver.process_document("book.pdf", &pages(20)).await.unwrap();

        // 20페이지째는 주기와 겹치지만 최종 요약만 생성
        assert_eq!(model.call_count(), 21);
        assert_eq!(count_files(&config.summaries_dir(), "_interval_"), 0);
        assert_eq!(count_files(&config.summaries_dir(), "_final_"), 1);
    }

    #[tokio::test]
    async fn test_max_pages_caps_processing() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, None, Some(4));

        let mut script: Vec<Result<String, String>> = Vec::new();
        for i in 1..=4 {
            script.push(Ok(content_response(&format!("fact {}", i))));
        }
        script.push(Ok("## Final".to_string()));

        let model = Arc::new(ScriptedGenerator::new(script));
        let driver = BatchDriver::new(config.clone(), model.clone());

        driver.process_document("book.pdf", &pages(10)).await.unwrap();

        // 4페이지째가 마지막 처리 페이지가 되어 최종 요약 발생
        assert_eq!(model.call_count(), 5);

        let store = KnowledgeStore::new(config.knowledge_dir());
        assert_eq!(store.load("book.pdf").unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_rerun_appends_duplicates() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, None, None);

        let model = Arc::new(ScriptedGenerator::repeating(&content_response("same fact")));
        let driver = BatchDriver::new(config.clone(), model);

        driver.process_document("book.pdf", &pages(3)).await.unwrap();
        driver.process_document("book.pdf", &pages(3)).await.unwrap();

        // 재처리된 페이지는 중복 누적됨 (중복 제거 없음)
        let store = KnowledgeStore::new(config.knowledge_dir());
        assert_eq!(store.load("book.pdf").unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_transport_error_propagates_to_document_boundary() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, None, None);

        let model = Arc::new(ScriptedGenerator::new(vec![
            Ok(content_response("fact 1")),
            Err("network down".to_string()),
        ]));
        let driver = BatchDriver::new(config.clone(), model);

        let result = driver.process_document("book.pdf", &pages(3)).await;
        assert!(result.is_err());

        // 실패 전까지의 진행 상황은 저장되어 있음
        let store = KnowledgeStore::new(config.knowledge_dir());
        assert_eq!(store.load("book.pdf").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_continues_past_unreadable_pdf() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, None, None);
        std::fs::create_dir_all(&config.input_dir).unwrap();

        // PDF가 아닌 내용의 파일 - 추출 단계에서 실패
        std::fs::write(config.input_dir.join("broken_a.pdf"), "not a pdf").unwrap();
        std::fs::write(config.input_dir.join("broken_b.pdf"), "also not a pdf").unwrap();

        let model = Arc::new(ScriptedGenerator::repeating(EMPTY_RESPONSE));
        let driver = BatchDriver::new(config, model.clone());

        // 문서 단위 실패는 배치를 중단시키지 않음
        driver.run().await.unwrap();
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_with_empty_input_dir() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, None, None);
        std::fs::create_dir_all(&config.input_dir).unwrap();

        let model = Arc::new(ScriptedGenerator::repeating(EMPTY_RESPONSE));
        let driver = BatchDriver::new(config, model);

        driver.run().await.unwrap();
    }

    #[test]
    fn test_document_name() {
        assert_eq!(document_name(Path::new("input_books/book.pdf")), "book.pdf");
    }
}
