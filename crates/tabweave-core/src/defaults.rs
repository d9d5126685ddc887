//! Centralized default constants for tabweave.
//!
//! **This module is the single source of truth** for tunable values. Config
//! structs in the other crates default to these constants; nothing else
//! should carry its own magic number.
//!
//! Organized by component. When adding a constant, place it in the matching
//! section.

// =============================================================================
// TEXT INDEX
// =============================================================================

/// BM25 term-frequency saturation parameter.
pub const BM25_K1: f64 = 1.5;

/// BM25 document-length normalization parameter.
pub const BM25_B: f64 = 0.75;

/// Minimum token length kept by the tokenizer and the term filter.
pub const TOKEN_MIN_LEN: usize = 3;

/// Maximum term length kept by the term filter.
pub const TOKEN_MAX_LEN: usize = 30;

/// Document-frequency ratio above which a term is a statistical stop word.
pub const STOP_WORD_DF_RATIO: f64 = 0.4;

/// Corpus size at which stop-word detection starts.
pub const STOP_WORD_MIN_DOCS: usize = 3;

/// Corpus size above which single-document terms are dropped.
pub const RARE_TERM_MIN_DOCS: usize = 10;

/// Joins the tokens of a generated n-gram. Never occurs inside a token.
pub const NGRAM_SEPARATOR: char = ' ';

/// Largest generated n-gram (bigrams and trigrams).
pub const NGRAM_MAX: usize = 3;

/// Key of the persisted text index blob in the key-value store.
pub const TEXT_INDEX_KEY: &str = "text_index";

// =============================================================================
// RELATIONSHIP GRAPH
// =============================================================================

/// Strength of a newly created relationship.
pub const RELATIONSHIP_BASE_STRENGTH: f64 = 0.3;

/// Strength added by each repeated interaction.
pub const RELATIONSHIP_STRENGTHEN_STEP: f64 = 0.1;

/// Maximum contribution of entity/topic Jaccard overlap during enrichment.
pub const ENRICH_JACCARD_WEIGHT: f64 = 0.3;

/// Maximum contribution of the AI semantic score during enrichment.
pub const ENRICH_SEMANTIC_WEIGHT: f64 = 0.4;

/// Semantic score below which an overlap-free relationship is pruned.
pub const PRUNE_SEMANTIC_THRESHOLD: f64 = 0.2;

/// Strength below which a relationship is deleted.
pub const RELATIONSHIP_DELETE_THRESHOLD: f64 = 0.1;

/// Strength lost per whole week of inactivity.
pub const DECAY_PER_WEEK: f64 = 0.05;

/// Upper bound on the strength lost in a single decay run.
pub const DECAY_MAX: f64 = 0.3;

/// Default minimum strength for related-tab lookup.
pub const RELATED_MIN_STRENGTH: f64 = 0.3;

/// Maximum related tabs returned.
pub const RELATED_LIMIT: usize = 10;

/// Pause between semantic-similarity calls during an enrichment sweep.
pub const SEMANTIC_PACING_MS: u64 = 500;

/// Minimum shared entities + topics for a content relationship.
pub const CONTENT_OVERLAP_MIN_SHARED: usize = 1;

/// How many recently enriched tabs an incremental pass compares against.
pub const RECENT_RELATIONSHIP_WINDOW: usize = 20;

// =============================================================================
// WORKFLOW MINER
// =============================================================================

/// Shortest mined navigation sequence.
pub const WORKFLOW_MIN_LEN: usize = 2;

/// Longest mined navigation sequence.
pub const WORKFLOW_MAX_LEN: usize = 5;

/// Lookback window over the navigation log, in days.
pub const WORKFLOW_WINDOW_DAYS: i64 = 30;

/// Largest gap between consecutive steps of one sequence, in minutes.
pub const WORKFLOW_CONTIGUITY_GAP_MINUTES: i64 = 10;

/// Occurrences required before a sequence becomes a pattern.
pub const WORKFLOW_MIN_FREQUENCY: u32 = 3;

/// Frequency at which confidence saturates at 1.0.
pub const WORKFLOW_CONFIDENCE_SATURATION: f64 = 10.0;

/// Joins the URLs of a workflow chain key.
pub const WORKFLOW_CHAIN_SEPARATOR: &str = " -> ";

// =============================================================================
// HYBRID SCORER
// =============================================================================

/// Maximum number of scored suggestions.
pub const SUGGESTION_LIMIT: usize = 10;

/// Divisor that maps raw BM25 into [0, 1].
pub const BM25_NORMALIZER: f64 = 10.0;

/// Title repetitions in the scorer query (title boost).
pub const QUERY_TITLE_REPEAT: usize = 3;

/// Keyword repetitions in the enriched scorer query.
pub const QUERY_KEYWORD_REPEAT: usize = 2;

/// Entity repetitions in the enriched scorer query.
pub const QUERY_ENTITY_REPEAT: usize = 3;

/// Topic repetitions in the enriched scorer query.
pub const QUERY_TOPIC_REPEAT: usize = 2;

/// Entity overlap-count bonus divisor.
pub const ENTITY_OVERLAP_DIVISOR: f64 = 5.0;

/// Entity overlap-count bonus cap.
pub const ENTITY_OVERLAP_CAP: f64 = 0.5;

/// Topic overlap-count bonus divisor.
pub const TOPIC_OVERLAP_DIVISOR: f64 = 3.0;

/// Topic overlap-count bonus cap.
pub const TOPIC_OVERLAP_CAP: f64 = 0.4;

/// Navigation events from the current tab considered for the behavioral score.
pub const BEHAVIORAL_EVENT_WINDOW: usize = 100;

/// Count at which behavioral and access-frequency scores saturate.
pub const COUNT_SATURATION: f64 = 10.0;

/// Recency decays linearly to zero over this many minutes.
pub const RECENCY_WINDOW_MINUTES: f64 = 24.0 * 60.0;

/// Temporal proximity decays quadratically to zero over this many minutes.
pub const TEMPORAL_WINDOW_MINUTES: f64 = 30.0;

/// Multiplier applied to workflow prediction confidence.
pub const WORKFLOW_BONUS_WEIGHT: f64 = 0.3;

/// Number of index terms attached to a suggestion explanation.
pub const EXPLANATION_TOP_TERMS: usize = 5;

// Lite-mode weights.
pub const LITE_WEIGHT_TEXT: f64 = 0.20;
pub const LITE_WEIGHT_COSINE: f64 = 0.15;
pub const LITE_WEIGHT_AI_BONUS: f64 = 0.20;
pub const LITE_WEIGHT_BEHAVIORAL: f64 = 0.15;
pub const LITE_WEIGHT_ACCESS: f64 = 0.10;
pub const LITE_WEIGHT_RECENCY: f64 = 0.08;
pub const LITE_WEIGHT_TEMPORAL: f64 = 0.07;

// Hybrid-mode weights.
pub const HYBRID_WEIGHT_TEXT: f64 = 0.18;
pub const HYBRID_WEIGHT_COSINE: f64 = 0.12;
pub const HYBRID_WEIGHT_ENTITY: f64 = 0.28;
pub const HYBRID_WEIGHT_TOPIC: f64 = 0.22;
pub const HYBRID_WEIGHT_RELATIONSHIP: f64 = 0.10;
pub const HYBRID_WEIGHT_BEHAVIORAL: f64 = 0.10;

/// Same-domain bonus. Same domain is not evidence of relevance.
pub const DOMAIN_MATCH_WEIGHT: f64 = 0.0;

// =============================================================================
// ENRICHMENT PIPELINE
// =============================================================================

/// Page text extraction timeout during the bulk pass, in seconds.
pub const BULK_EXTRACT_TIMEOUT_SECS: u64 = 10;

/// Page text extraction timeout during the incremental pass, in seconds.
pub const INCREMENTAL_EXTRACT_TIMEOUT_SECS: u64 = 5;

/// Delay before an incremental pass starts, letting the page finish loading.
pub const INCREMENTAL_DEBOUNCE_MS: u64 = 2000;

/// Extracted text shorter than this (in characters) is not enriched.
pub const MIN_EXTRACTED_CHARS: usize = 100;

/// Raw page text is truncated to this many characters before storage.
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Text sent to the summarizer is truncated to this many characters.
pub const MAX_SUMMARY_INPUT_CHARS: usize = 4_000;

/// Cleaned text needs this many words before the AI summarizer is used.
pub const SUMMARY_MIN_WORDS: usize = 50;

/// Word count of the naive fallback summary.
pub const NAIVE_SUMMARY_WORDS: usize = 200;

/// A word repeated this many times in a row is collapsed to one.
pub const REPEATED_WORD_RUN: usize = 3;

/// Words per minute for reading-time estimates.
pub const READING_WORDS_PER_MINUTE: usize = 200;

/// Keywords produced by the manual fallback extractor.
pub const FALLBACK_KEYWORD_COUNT: usize = 10;

/// Entities produced by the manual fallback extractor.
pub const FALLBACK_ENTITY_COUNT: usize = 5;

/// Topics produced by the manual fallback extractor.
pub const FALLBACK_TOPIC_COUNT: usize = 3;

/// Key of the persisted bulk pass state.
pub const BULK_STATE_KEY: &str = "enrichment_bulk_state";

/// Key of the persisted pause flag.
pub const PAUSE_STATE_KEY: &str = "enrichment_pause_state";

/// Idle poll interval of the enrichment worker when nothing is queued.
pub const WORKER_IDLE_POLL_MS: u64 = 1000;

/// Capacity of the worker event broadcast channel.
pub const WORKER_EVENT_CAPACITY: usize = 256;

// =============================================================================
// SUGGESTION CACHE / SERVER
// =============================================================================

/// Lifetime of a cached suggestion list, in seconds.
pub const SUGGESTION_CACHE_TTL_SECS: u64 = 30;

/// Maximum number of cached suggestion lists.
pub const SUGGESTION_CACHE_CAPACITY: usize = 256;

/// Interval between maintenance runs (decay + workflow mining), in seconds.
pub const MAINTENANCE_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Default HTTP bind address.
pub const SERVER_BIND: &str = "127.0.0.1:7878";

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Default generation model.
pub const GEN_MODEL: &str = "llama3.2:3b";

/// Generation request timeout, in seconds. Only bounds the HTTP transport.
pub const GEN_TIMEOUT_SECS: u64 = 300;

/// Availability probe timeout, in seconds.
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hybrid_weights_sum_to_one() {
        let sum = HYBRID_WEIGHT_TEXT
            + HYBRID_WEIGHT_COSINE
            + HYBRID_WEIGHT_ENTITY
            + HYBRID_WEIGHT_TOPIC
            + HYBRID_WEIGHT_RELATIONSHIP
            + HYBRID_WEIGHT_BEHAVIORAL;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn lite_weights_leave_room_for_nothing_else() {
        let sum = LITE_WEIGHT_TEXT
            + LITE_WEIGHT_COSINE
            + LITE_WEIGHT_AI_BONUS
            + LITE_WEIGHT_BEHAVIORAL
            + LITE_WEIGHT_ACCESS
            + LITE_WEIGHT_RECENCY
            + LITE_WEIGHT_TEMPORAL;
        assert!(sum <= 1.0 + 1e-9);
        assert_eq!(DOMAIN_MATCH_WEIGHT, 0.0);
    }

    #[test]
    fn workflow_lengths_ordered() {
        const {
            assert!(WORKFLOW_MIN_LEN >= 2);
            assert!(WORKFLOW_MIN_LEN <= WORKFLOW_MAX_LEN);
        }
    }

    #[test]
    fn incremental_timeout_shorter_than_bulk() {
        const {
            assert!(INCREMENTAL_EXTRACT_TIMEOUT_SECS < BULK_EXTRACT_TIMEOUT_SECS);
            assert!(TOKEN_MIN_LEN < TOKEN_MAX_LEN);
        }
    }

    #[test]
    fn relationship_thresholds_ordered() {
        let values = [
            RELATIONSHIP_DELETE_THRESHOLD,
            PRUNE_SEMANTIC_THRESHOLD,
            RELATIONSHIP_BASE_STRENGTH,
        ];
        for w in values.windows(2) {
            assert!(w[0] < w[1], "Expected {} < {}", w[0], w[1]);
        }
    }
}
