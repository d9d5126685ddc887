//! The per-tab enrichment step shared by the bulk and incremental passes:
//! extract, clean, summarize, extract metadata, write back, re-index.
//!
//! Only the extraction is time-bounded. Capability failures fall back to
//! the deterministic summary and frequency extraction and never fail the
//! step; a tab whose text cannot be extracted keeps its lite document.
//!
//! The write-back re-reads the document, so lifecycle changes made while
//! extraction and analysis were in flight are kept. Content for a tab that
//! closed or navigated away in the meantime is discarded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use tabweave_core::{
    defaults, detect_application, ContentUpdate, DocumentType, KeyValueStore, PageExtract, Result,
    TabClassification, TabContent, TabDocument, TabDocumentRepository, TabSnapshot,
    TextExtractor,
};
use tabweave_inference::{
    extract_by_frequency, naive_summary, truncate_chars, ContentAnalyzer, ExtractedMetadata,
};
use tabweave_search::SharedTextIndex;

use crate::cleaning::{clean_text, reading_time_minutes, word_count};

/// Why a tab was not enriched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    TabClosed,
    DocumentMissing,
    AlreadyEnriched,
    ExtractionFailed,
    ExtractionTimedOut,
    TooShort,
    /// Storage or index failure while writing the result back.
    Failed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::TabClosed => "tab_closed",
            SkipReason::DocumentMissing => "document_missing",
            SkipReason::AlreadyEnriched => "already_enriched",
            SkipReason::ExtractionFailed => "extraction_failed",
            SkipReason::ExtractionTimedOut => "extraction_timed_out",
            SkipReason::TooShort => "too_short",
            SkipReason::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrichOutcome {
    Enriched(Box<TabDocument>),
    Skipped(SkipReason),
}

pub struct TabEnricher {
    documents: Arc<dyn TabDocumentRepository>,
    extractor: Arc<dyn TextExtractor>,
    analyzer: ContentAnalyzer,
    index: SharedTextIndex,
    kv: Arc<dyn KeyValueStore>,
}

impl TabEnricher {
    pub fn new(
        documents: Arc<dyn TabDocumentRepository>,
        extractor: Arc<dyn TextExtractor>,
        analyzer: ContentAnalyzer,
        index: SharedTextIndex,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            documents,
            extractor,
            analyzer,
            index,
            kv,
        }
    }

    pub fn analyzer(&self) -> &ContentAnalyzer {
        &self.analyzer
    }

    /// Enrich the document attached to `tab`.
    #[instrument(skip(self, tab), fields(subsystem = "jobs", component = "enricher", op = "enrich", tab_handle = tab.handle))]
    pub async fn enrich(
        &self,
        tab: &TabSnapshot,
        extract_timeout: Duration,
        now: DateTime<Utc>,
    ) -> Result<EnrichOutcome> {
        let start = Instant::now();
        let Some(doc) = self.documents.find_by_handle(tab.handle).await? else {
            return Ok(EnrichOutcome::Skipped(SkipReason::DocumentMissing));
        };
        if doc.is_enriched() && !doc.needs_reindex {
            return Ok(EnrichOutcome::Skipped(SkipReason::AlreadyEnriched));
        }

        let extract = match tokio::time::timeout(extract_timeout, self.extractor.extract(tab)).await {
            Ok(Ok(extract)) => extract,
            Ok(Err(e)) => {
                warn!(doc_id = %doc.id, error = %e, "Text extraction failed, keeping lite document");
                return Ok(EnrichOutcome::Skipped(SkipReason::ExtractionFailed));
            }
            Err(_) => {
                warn!(
                    doc_id = %doc.id,
                    timeout_ms = extract_timeout.as_millis() as u64,
                    "Text extraction timed out, keeping lite document"
                );
                return Ok(EnrichOutcome::Skipped(SkipReason::ExtractionTimedOut));
            }
        };

        let cleaned = clean_text(&extract.text);
        if cleaned.chars().count() < defaults::MIN_EXTRACTED_CHARS {
            debug!(doc_id = %doc.id, skip_reason = "too_short", "Extracted text too short to enrich");
            return Ok(EnrichOutcome::Skipped(SkipReason::TooShort));
        }

        let (content, classification) = self.analyze(&doc, &cleaned, &extract).await;
        let update = ContentUpdate {
            content,
            classification,
            indexed_at: now,
        };
        let Some(doc) = self
            .documents
            .update_content(doc.id, tab.handle, &update)
            .await?
        else {
            debug!(doc_id = %doc.id, skip_reason = "tab_closed", "Tab closed or navigated during enrichment");
            return Ok(EnrichOutcome::Skipped(SkipReason::TabClosed));
        };

        self.index.replace_document(&doc).await;
        self.index.persist(self.kv.as_ref()).await?;

        debug!(
            doc_id = %doc.id,
            word_count = doc.content.as_ref().map(|c| c.word_count).unwrap_or(0),
            duration_ms = start.elapsed().as_millis() as u64,
            "Tab enriched"
        );
        Ok(EnrichOutcome::Enriched(Box::new(doc)))
    }

    /// Build the content and classification for cleaned page text.
    pub async fn analyze(
        &self,
        doc: &TabDocument,
        cleaned: &str,
        extract: &PageExtract,
    ) -> (TabContent, TabClassification) {
        let words = word_count(cleaned);
        let summary = self.summarize(doc, cleaned, words).await;
        let metadata = self.extract_metadata(doc, cleaned, &summary).await;

        let application = detect_application(&doc.domain);
        let document_type = match metadata.document_type {
            DocumentType::Other => application.map(|app| app.document_type).unwrap_or_default(),
            detected => detected,
        };

        let content = TabContent {
            text: truncate_chars(cleaned, defaults::MAX_CONTENT_CHARS).to_string(),
            summary,
            keywords: metadata.keywords,
            entities: metadata.entities,
            topics: metadata.topics,
            language: extract.language.clone(),
            word_count: words,
        };
        let classification = TabClassification {
            document_type,
            application: application.map(|app| app.name.to_string()),
            has_form: extract.has_form,
            has_video: extract.has_video,
            reading_time_minutes: reading_time_minutes(words),
        };
        (content, classification)
    }

    async fn summarize(&self, doc: &TabDocument, cleaned: &str, words: usize) -> String {
        if words < defaults::SUMMARY_MIN_WORDS {
            debug!(doc_id = %doc.id, word_count = words, "Too few words for AI summary, using leading words");
        } else if self.analyzer.is_available() {
            match self.analyzer.summarize(&doc.title, cleaned).await {
                Ok(summary) => return summary,
                Err(e) => {
                    warn!(doc_id = %doc.id, error = %e, "Summarization failed, using leading words");
                }
            }
        }
        naive_summary(cleaned, defaults::NAIVE_SUMMARY_WORDS)
    }

    async fn extract_metadata(
        &self,
        doc: &TabDocument,
        cleaned: &str,
        summary: &str,
    ) -> ExtractedMetadata {
        if self.analyzer.is_available() {
            match self.analyzer.extract_metadata(&doc.title, summary).await {
                Ok(metadata) => return metadata,
                Err(e) => {
                    warn!(doc_id = %doc.id, error = %e, "Metadata extraction failed, using term frequency");
                }
            }
        }
        extract_by_frequency(&doc.title, cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tabweave_core::{Error, TabHandle};
    use tabweave_db::Database;
    use tabweave_inference::mock::MockGenerationBackend;
    use tabweave_inference::AiSession;

    /// Extractor answering from a fixed map; unknown handles fail.
    struct MapExtractor {
        pages: HashMap<TabHandle, String>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl TextExtractor for MapExtractor {
        async fn extract(&self, tab: &TabSnapshot) -> Result<PageExtract> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.pages
                .get(&tab.handle)
                .map(|text| PageExtract::text(text.clone()))
                .ok_or_else(|| Error::Extraction("no page".to_string()))
        }
    }

    const LONG_PAGE: &str = "Acme Corp published the quarterly budget review for the finance \
        team. The review covers hiring plans, vendor contracts, travel policy changes, and the \
        capital expenditure forecast for the next fiscal year. Each department lead must confirm \
        their numbers before the board meeting on Friday. Late submissions delay the consolidated \
        report and push the approval into the following month, so please review carefully.";

    fn enricher(db: &Database, analyzer: ContentAnalyzer, delay: Option<Duration>) -> TabEnricher {
        let mut pages = HashMap::new();
        pages.insert(1, LONG_PAGE.to_string());
        pages.insert(2, "tiny page".to_string());
        TabEnricher::new(
            db.documents.clone(),
            Arc::new(MapExtractor { pages, delay }),
            analyzer,
            SharedTextIndex::default(),
            db.kv.clone(),
        )
    }

    async fn observed(db: &Database, handle: TabHandle, url: &str) -> TabSnapshot {
        let snapshot = TabSnapshot::new(handle, "Quarterly budget", url);
        db.documents
            .insert(TabDocument::lite(&snapshot, Utc::now()))
            .await
            .unwrap();
        snapshot
    }

    #[tokio::test]
    async fn test_enrich_with_ai() {
        let db = Database::in_memory().await.unwrap();
        let backend = MockGenerationBackend::new()
            .with_response_containing(
                "KEYWORDS:",
                "KEYWORDS: budget, review\nENTITIES: Acme Corp\nTOPICS: finance\nTYPE: report",
            )
            .with_fixed_response("Acme's quarterly budget review.");
        let analyzer = ContentAnalyzer::new(AiSession::from_backend(Arc::new(backend.clone())));
        let e = enricher(&db, analyzer, None);
        let tab = observed(&db, 1, "https://intranet.example.com/budget").await;

        let outcome = e.enrich(&tab, Duration::from_secs(5), Utc::now()).await.unwrap();
        let EnrichOutcome::Enriched(doc) = outcome else {
            panic!("expected enrichment, got {:?}", outcome);
        };
        let content = doc.content.as_ref().unwrap();
        assert_eq!(content.summary, "Acme's quarterly budget review.");
        assert_eq!(content.entities, vec!["Acme Corp"]);
        assert_eq!(doc.classification.document_type, DocumentType::Report);
        assert_eq!(doc.classification.reading_time_minutes, 1);
        assert!(doc.is_enriched());
        assert_eq!(backend.call_count(), 2);

        let stored = db.documents.get(doc.id).await.unwrap().unwrap();
        assert_eq!(stored, *doc);
        assert!(db.kv.get(defaults::TEXT_INDEX_KEY).await.unwrap().is_some());
        assert_eq!(e.index.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_enrich_without_ai_uses_fallbacks() {
        let db = Database::in_memory().await.unwrap();
        let e = enricher(&db, ContentAnalyzer::unavailable(), None);
        let tab = observed(&db, 1, "https://docs.google.com/document/d/1").await;

        let EnrichOutcome::Enriched(doc) = e.enrich(&tab, Duration::from_secs(5), Utc::now()).await.unwrap() else {
            panic!("expected enrichment");
        };
        let content = doc.content.as_ref().unwrap();
        assert!(LONG_PAGE.starts_with(&content.summary[..40]));
        assert!(!content.keywords.is_empty());
        // The application table refines an unknown type.
        assert_eq!(doc.classification.document_type, DocumentType::Document);
    }

    #[tokio::test]
    async fn test_failing_ai_falls_back_per_call() {
        let db = Database::in_memory().await.unwrap();
        let backend = MockGenerationBackend::new().always_failing();
        let analyzer = ContentAnalyzer::new(AiSession::from_backend(Arc::new(backend)));
        let e = enricher(&db, analyzer, None);
        let tab = observed(&db, 1, "https://intranet.example.com/budget").await;

        let outcome = e.enrich(&tab, Duration::from_secs(5), Utc::now()).await.unwrap();
        assert!(matches!(outcome, EnrichOutcome::Enriched(_)));
    }

    #[tokio::test]
    async fn test_short_page_is_skipped_and_stays_lite() {
        let db = Database::in_memory().await.unwrap();
        let e = enricher(&db, ContentAnalyzer::unavailable(), None);
        let tab = observed(&db, 2, "https://a.example.com/").await;

        let outcome = e.enrich(&tab, Duration::from_secs(5), Utc::now()).await.unwrap();
        assert_eq!(outcome, EnrichOutcome::Skipped(SkipReason::TooShort));
        let doc = db.documents.find_by_handle(2).await.unwrap().unwrap();
        assert!(!doc.is_indexed);
    }

    #[tokio::test]
    async fn test_extraction_failure_and_missing_document() {
        let db = Database::in_memory().await.unwrap();
        let e = enricher(&db, ContentAnalyzer::unavailable(), None);
        let tab = observed(&db, 3, "https://a.example.com/").await;
        let outcome = e.enrich(&tab, Duration::from_secs(5), Utc::now()).await.unwrap();
        assert_eq!(outcome, EnrichOutcome::Skipped(SkipReason::ExtractionFailed));

        let unknown = TabSnapshot::new(99, "x", "https://b.example.com/");
        let outcome = e.enrich(&unknown, Duration::from_secs(5), Utc::now()).await.unwrap();
        assert_eq!(outcome, EnrichOutcome::Skipped(SkipReason::DocumentMissing));
    }

    #[tokio::test]
    async fn test_extraction_timeout() {
        let db = Database::in_memory().await.unwrap();
        let e = enricher(&db, ContentAnalyzer::unavailable(), Some(Duration::from_secs(5)));
        let tab = observed(&db, 1, "https://a.example.com/").await;

        let outcome = e.enrich(&tab, Duration::from_millis(50), Utc::now()).await.unwrap();
        assert_eq!(outcome, EnrichOutcome::Skipped(SkipReason::ExtractionTimedOut));
    }

    #[tokio::test]
    async fn test_close_during_extraction_is_not_overwritten() {
        let db = Database::in_memory().await.unwrap();
        let e = enricher(&db, ContentAnalyzer::unavailable(), Some(Duration::from_secs(1)));
        let tab = observed(&db, 1, "https://intranet.example.com/budget").await;

        let documents = db.documents.clone();
        let closer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let mut doc = documents.find_by_handle(1).await.unwrap().unwrap();
            doc.is_active = false;
            doc.tab_handle = None;
            doc.access_count += 5;
            documents.update(&doc).await.unwrap();
            doc.id
        });

        let outcome = e.enrich(&tab, Duration::from_secs(5), Utc::now()).await.unwrap();
        let id = closer.await.unwrap();
        assert_eq!(outcome, EnrichOutcome::Skipped(SkipReason::TabClosed));

        let stored = db.documents.get(id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.tab_handle, None);
        assert_eq!(stored.access_count, 5);
        assert!(!stored.is_indexed);
        assert!(db.documents.find_by_handle(1).await.unwrap().is_none());
        assert!(e.index.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_activation_during_extraction_is_kept() {
        let db = Database::in_memory().await.unwrap();
        let e = enricher(&db, ContentAnalyzer::unavailable(), Some(Duration::from_millis(600)));
        let tab = observed(&db, 1, "https://intranet.example.com/budget").await;

        let documents = db.documents.clone();
        let activator = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let mut doc = documents.find_by_handle(1).await.unwrap().unwrap();
            doc.touch(Utc::now());
            doc.touch(Utc::now());
            documents.update(&doc).await.unwrap();
        });

        let outcome = e.enrich(&tab, Duration::from_secs(5), Utc::now()).await.unwrap();
        activator.await.unwrap();
        let EnrichOutcome::Enriched(doc) = outcome else {
            panic!("expected enrichment, got {:?}", outcome);
        };
        assert_eq!(doc.access_count, 2);
        let stored = db.documents.find_by_handle(1).await.unwrap().unwrap();
        assert_eq!(stored.access_count, 2);
        assert!(stored.is_enriched());
    }

    #[tokio::test]
    async fn test_enriched_document_is_not_redone() {
        let db = Database::in_memory().await.unwrap();
        let e = enricher(&db, ContentAnalyzer::unavailable(), None);
        let tab = observed(&db, 1, "https://a.example.com/").await;
        e.enrich(&tab, Duration::from_secs(5), Utc::now()).await.unwrap();

        let again = e.enrich(&tab, Duration::from_secs(5), Utc::now()).await.unwrap();
        assert_eq!(again, EnrichOutcome::Skipped(SkipReason::AlreadyEnriched));
    }
}
