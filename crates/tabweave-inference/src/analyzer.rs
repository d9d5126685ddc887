//! Summaries, structured extraction and similarity judgments over one
//! [`AiSession`].
//!
//! Every method fails with `CapabilityUnavailable` when the session is
//! unavailable, and with `Inference` when the backend call fails. Callers
//! own the fallback; parsing never fails.

use std::time::Instant;
use tracing::{debug, instrument};

use tabweave_core::{defaults, Error, GenerationBackend, Result};

use crate::parse::{parse_extraction, parse_similarity};
use crate::prompts;
use crate::session::AiSession;
use crate::types::{DocumentProfile, ExtractedMetadata, SimilarityJudgment};

#[derive(Debug, Clone)]
pub struct ContentAnalyzer {
    session: AiSession,
    max_input_chars: usize,
}

impl ContentAnalyzer {
    pub fn new(session: AiSession) -> Self {
        Self {
            session,
            max_input_chars: defaults::MAX_SUMMARY_INPUT_CHARS,
        }
    }

    /// Analyzer for devices without an AI capability.
    pub fn unavailable() -> Self {
        Self::new(AiSession::Unavailable)
    }

    /// Limit the text sent to the summarizer.
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    pub fn is_available(&self) -> bool {
        self.session.is_available()
    }

    fn backend(&self, capability: &str) -> Result<&dyn GenerationBackend> {
        self.session
            .backend()
            .map(|b| b.as_ref())
            .ok_or_else(|| Error::CapabilityUnavailable(capability.to_string()))
    }

    /// Summarize cleaned page text. The input is truncated, the call is not
    /// time-bounded.
    #[instrument(skip(self, title, text), fields(subsystem = "inference", component = "analyzer", op = "summarize", word_count = text.split_whitespace().count()))]
    pub async fn summarize(&self, title: &str, text: &str) -> Result<String> {
        let backend = self.backend("summarization")?;
        let input = truncate_chars(text, self.max_input_chars);
        let start = Instant::now();
        let summary = backend
            .generate_with_system(prompts::SUMMARY_SYSTEM, &prompts::summary_prompt(title, input))
            .await?;
        let summary = summary.trim().to_string();
        debug!(
            response_len = summary.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Summary generated"
        );
        if summary.is_empty() {
            return Err(Error::Inference("empty summary".to_string()));
        }
        Ok(summary)
    }

    /// Extract keywords, entities, topics and a document type from a summary.
    #[instrument(skip(self, title, summary), fields(subsystem = "inference", component = "analyzer", op = "extract_metadata"))]
    pub async fn extract_metadata(&self, title: &str, summary: &str) -> Result<ExtractedMetadata> {
        let backend = self.backend("structured extraction")?;
        let response = backend
            .generate_with_system(
                prompts::EXTRACTION_SYSTEM,
                &prompts::extraction_prompt(title, summary),
            )
            .await?;
        let metadata = parse_extraction(&response);
        debug!(
            keywords = metadata.keywords.len(),
            entities = metadata.entities.len(),
            topics = metadata.topics.len(),
            document_type = %metadata.document_type,
            "Metadata extracted"
        );
        Ok(metadata)
    }

    /// Judge how related two documents are.
    #[instrument(skip(self, a, b), fields(subsystem = "inference", component = "analyzer", op = "judge_similarity"))]
    pub async fn judge_similarity(
        &self,
        a: &DocumentProfile,
        b: &DocumentProfile,
    ) -> Result<SimilarityJudgment> {
        let backend = self.backend("semantic similarity")?;
        let response = backend
            .generate_with_system(prompts::SIMILARITY_SYSTEM, &prompts::similarity_prompt(a, b))
            .await?;
        let judgment = parse_similarity(&response);
        debug!(
            score = judgment.score,
            relationship_type = %judgment.relationship_type,
            "Similarity judged"
        );
        Ok(judgment)
    }
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGenerationBackend;
    use std::sync::Arc;
    use tabweave_core::{DocumentType, RelationshipType};

    fn analyzer(backend: MockGenerationBackend) -> ContentAnalyzer {
        ContentAnalyzer::new(AiSession::from_backend(Arc::new(backend)))
    }

    #[tokio::test]
    async fn test_unavailable_session_errors() {
        let analyzer = ContentAnalyzer::unavailable();
        let err = analyzer.summarize("t", "text").await.unwrap_err();
        assert!(matches!(err, Error::CapabilityUnavailable(_)));
        assert!(!analyzer.is_available());
    }

    #[tokio::test]
    async fn test_summarize_trims_and_truncates_input() {
        let backend = MockGenerationBackend::new().with_fixed_response("  A summary.  ");
        let analyzer = analyzer(backend.clone()).with_max_input_chars(5);
        let summary = analyzer.summarize("Title", "abcdefghij").await.unwrap();
        assert_eq!(summary, "A summary.");
        let prompt = &backend.get_calls()[0].prompt;
        assert!(prompt.contains("abcde"));
        assert!(!prompt.contains("abcdef"));
    }

    #[tokio::test]
    async fn test_empty_summary_is_an_error() {
        let analyzer = analyzer(MockGenerationBackend::new().with_fixed_response("   "));
        assert!(analyzer.summarize("t", "text").await.is_err());
    }

    #[tokio::test]
    async fn test_extract_metadata_parses_response() {
        let backend = MockGenerationBackend::new().with_response_containing(
            "KEYWORDS",
            "KEYWORDS: tokio, async\nENTITIES: Tokio\nTOPICS: rust\nTYPE: code",
        );
        let meta = analyzer(backend)
            .extract_metadata("Tokio docs", "Async runtime docs")
            .await
            .unwrap();
        assert_eq!(meta.keywords, vec!["tokio", "async"]);
        assert_eq!(meta.document_type, DocumentType::Code);
    }

    #[tokio::test]
    async fn test_judge_similarity_parses_response() {
        let backend = MockGenerationBackend::new().with_response_containing(
            "SIMILARITY_SCORE",
            "SIMILARITY_SCORE: 0.6\nRELATIONSHIP_TYPE: sequential\nREASON: Step two.",
        );
        let judgment = analyzer(backend)
            .judge_similarity(&DocumentProfile::default(), &DocumentProfile::default())
            .await
            .unwrap();
        assert_eq!(judgment.score, 0.6);
        assert_eq!(judgment.relationship_type, RelationshipType::Sequential);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let analyzer = analyzer(MockGenerationBackend::new().always_failing());
        let err = analyzer.extract_metadata("t", "s").await.unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
