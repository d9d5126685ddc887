//! Structured logging schema and field name constants for tabweave.
//!
//! Every crate logs with these field names so that a JSON log stream can be
//! filtered the same way regardless of which subsystem emitted the event.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Storage or serialization failure, snapshot could not be persisted |
//! | WARN  | Capability failure with fallback applied, per-item sweep failure |
//! | INFO  | Lifecycle events (worker start/stop, bulk pass start/pause/complete) |
//! | DEBUG | Decision points: scoring mode, skip reasons, prune decisions |
//! | TRACE | Per-candidate signal values, per-term index bookkeeping |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "search", "graph", "db", "inference", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "text_index", "hybrid_scorer", "relationships", "workflows", "worker"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "score", "enrich_with_semantics", "decay", "bulk_pass"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Tab document UUID being operated on.
pub const DOC_ID: &str = "doc_id";

/// Volatile browser tab handle.
pub const TAB_HANDLE: &str = "tab_handle";

/// Canonical relationship pair key.
pub const PAIR_KEY: &str = "pair_key";

/// Workflow chain key.
pub const CHAIN_KEY: &str = "chain_key";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of candidates considered by the scorer.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Word count of cleaned page text.
pub const WORD_COUNT: &str = "word_count";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Scoring fields ────────────────────────────────────────────────────────

/// Scoring mode selected ("lite", "hybrid").
pub const SCORING_MODE: &str = "scoring_mode";

/// Relationship strength after an update.
pub const STRENGTH: &str = "strength";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Why an item was skipped.
pub const SKIP_REASON: &str = "skip_reason";
