//! Core data models for tabweave.
//!
//! These types are shared across all tabweave crates and represent the
//! browsing entities the ranking core reasons about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;

/// Volatile browser-assigned tab identifier. Changes across browser restarts.
pub type TabHandle = i64;

// =============================================================================
// TAB DOCUMENTS
// =============================================================================

/// Closed set of document kinds a tab can be classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    Document,
    Email,
    MeetingNotes,
    Report,
    Code,
    Design,
    Article,
    #[default]
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 8] = [
        DocumentType::Document,
        DocumentType::Email,
        DocumentType::MeetingNotes,
        DocumentType::Report,
        DocumentType::Code,
        DocumentType::Design,
        DocumentType::Article,
        DocumentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Document => "document",
            DocumentType::Email => "email",
            DocumentType::MeetingNotes => "meeting-notes",
            DocumentType::Report => "report",
            DocumentType::Code => "code",
            DocumentType::Design => "design",
            DocumentType::Article => "article",
            DocumentType::Other => "other",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    /// Lenient: accepts `meeting-notes`, `meeting_notes` and `meeting notes`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Invalid document type: {}", s))
    }
}

/// Enriched content of a tab. Replaced wholesale on every re-enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TabContent {
    /// Extracted page text, truncated to a bounded length.
    pub text: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub entities: Vec<String>,
    pub topics: Vec<String>,
    pub language: Option<String>,
    pub word_count: usize,
}

/// Classification metadata derived from the URL and the enrichment pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TabClassification {
    pub document_type: DocumentType,
    /// Application detected from the domain (e.g. "GitHub").
    pub application: Option<String>,
    pub has_form: bool,
    pub has_video: bool,
    pub reading_time_minutes: u32,
}

/// One document per distinct browsing context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabDocument {
    pub id: Uuid,
    /// Current runtime handle; `None` once the tab has been closed.
    pub tab_handle: Option<TabHandle>,
    /// Hash of the normalized URL, the identity that survives restarts.
    pub url_hash: String,
    pub title: String,
    pub url: String,
    pub domain: String,
    pub favicon_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub access_count: u32,
    pub content: Option<TabContent>,
    pub classification: TabClassification,
    pub is_active: bool,
    pub is_pinned: bool,
    pub is_audible: bool,
    pub is_indexed: bool,
    pub needs_reindex: bool,
}

impl TabDocument {
    /// A lite (unenriched) document for a freshly observed tab.
    pub fn lite(snapshot: &TabSnapshot, now: DateTime<Utc>) -> Self {
        let url = crate::url_utils::normalize_url(&snapshot.url);
        let domain = crate::url_utils::extract_domain(&url);
        let application = crate::url_utils::detect_application(&domain);
        Self {
            id: Uuid::new_v4(),
            tab_handle: Some(snapshot.handle),
            url_hash: crate::url_utils::url_hash(&url),
            title: snapshot.title.clone(),
            url,
            domain,
            favicon_url: snapshot.favicon_url.clone(),
            created_at: now,
            last_accessed_at: snapshot.last_accessed_at.unwrap_or(now),
            last_indexed_at: None,
            access_count: 0,
            content: None,
            classification: TabClassification {
                document_type: application
                    .map(|app| app.document_type)
                    .unwrap_or_default(),
                application: application.map(|app| app.name.to_string()),
                ..Default::default()
            },
            is_active: true,
            is_pinned: snapshot.is_pinned,
            is_audible: snapshot.is_audible,
            is_indexed: false,
            needs_reindex: false,
        }
    }

    /// True once enrichment has completed at least once and content exists.
    pub fn is_enriched(&self) -> bool {
        self.is_indexed && self.content.is_some()
    }

    pub fn entities(&self) -> &[String] {
        self.content.as_ref().map(|c| c.entities.as_slice()).unwrap_or(&[])
    }

    pub fn topics(&self) -> &[String] {
        self.content.as_ref().map(|c| c.topics.as_slice()).unwrap_or(&[])
    }

    pub fn keywords(&self) -> &[String] {
        self.content.as_ref().map(|c| c.keywords.as_slice()).unwrap_or(&[])
    }

    pub fn summary(&self) -> Option<&str> {
        self.content
            .as_ref()
            .map(|c| c.summary.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Text fed to the text index: the title plus whatever content exists.
    pub fn index_text(&self) -> String {
        match &self.content {
            Some(content) => {
                let mut parts = vec![self.title.as_str()];
                if !content.summary.is_empty() {
                    parts.push(content.summary.as_str());
                }
                if !content.text.is_empty() {
                    parts.push(content.text.as_str());
                }
                let mut text = parts.join("\n");
                for term in content
                    .keywords
                    .iter()
                    .chain(&content.entities)
                    .chain(&content.topics)
                {
                    text.push(' ');
                    text.push_str(term);
                }
                text
            }
            None => self.title.clone(),
        }
    }

    /// Re-attach the document to a (possibly new) runtime handle.
    pub fn attach(&mut self, snapshot: &TabSnapshot, now: DateTime<Utc>) {
        self.tab_handle = Some(snapshot.handle);
        self.is_active = true;
        self.is_pinned = snapshot.is_pinned;
        self.is_audible = snapshot.is_audible;
        if !snapshot.title.is_empty() {
            self.title = snapshot.title.clone();
        }
        if snapshot.favicon_url.is_some() {
            self.favicon_url = snapshot.favicon_url.clone();
        }
        self.last_accessed_at = snapshot.last_accessed_at.unwrap_or(now);
    }

    /// Record an activation of this tab.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = now;
    }
}

/// Output of one enrichment pass, applied onto the stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentUpdate {
    pub content: TabContent,
    pub classification: TabClassification,
    pub indexed_at: DateTime<Utc>,
}

impl ContentUpdate {
    pub fn apply(&self, doc: &mut TabDocument) {
        doc.content = Some(self.content.clone());
        doc.classification = self.classification.clone();
        doc.is_indexed = true;
        doc.needs_reindex = false;
        doc.last_indexed_at = Some(self.indexed_at);
    }
}

/// What the browser reports about an open tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub handle: TabHandle,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_audible: bool,
    #[serde(default)]
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl TabSnapshot {
    pub fn new(handle: TabHandle, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            handle,
            title: title.into(),
            url: url.into(),
            favicon_url: None,
            is_pinned: false,
            is_audible: false,
            last_accessed_at: None,
        }
    }
}

/// Result of the page text extraction capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PageExtract {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub has_form: bool,
    #[serde(default)]
    pub has_video: bool,
}

impl PageExtract {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

/// Relationship type. `Navigation` and `Content` record how a relationship was
/// created; the others describe its semantic character after enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    Similar,
    Complementary,
    Sequential,
    Unrelated,
    Navigation,
    Content,
    Ai,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Similar => "similar",
            RelationshipType::Complementary => "complementary",
            RelationshipType::Sequential => "sequential",
            RelationshipType::Unrelated => "unrelated",
            RelationshipType::Navigation => "navigation",
            RelationshipType::Content => "content",
            RelationshipType::Ai => "ai",
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "similar" => Ok(RelationshipType::Similar),
            "complementary" => Ok(RelationshipType::Complementary),
            "sequential" => Ok(RelationshipType::Sequential),
            "unrelated" => Ok(RelationshipType::Unrelated),
            "navigation" => Ok(RelationshipType::Navigation),
            "content" => Ok(RelationshipType::Content),
            "ai" => Ok(RelationshipType::Ai),
            _ => Err(format!("Invalid relationship type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RelationshipMetadata {
    pub shared_entities: Vec<String>,
    pub shared_topics: Vec<String>,
    /// Jaccard co-occurrence score over entities and topics.
    pub cooccurrence_score: f64,
    /// Semantic similarity judged by the AI capability, once enriched.
    pub semantic_score: Option<f64>,
    pub reason: Option<String>,
    /// Decay already subtracted since the last interaction.
    #[serde(default)]
    pub decay_applied: f64,
}

/// Undirected weighted edge between two tab documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Canonical pair key, see [`pair_key`].
    pub id: String,
    /// The smaller of the two document ids.
    pub doc_a: Uuid,
    /// The larger of the two document ids.
    pub doc_b: Uuid,
    pub strength: f64,
    pub relationship_type: RelationshipType,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u32,
    pub metadata: RelationshipMetadata,
    pub ai_enriched: bool,
}

impl Relationship {
    pub fn new(a: Uuid, b: Uuid, relationship_type: RelationshipType, now: DateTime<Utc>) -> Self {
        let (doc_a, doc_b) = canonical_pair(a, b);
        Self {
            id: pair_key(a, b),
            doc_a,
            doc_b,
            strength: defaults::RELATIONSHIP_BASE_STRENGTH,
            relationship_type,
            created_at: now,
            last_accessed_at: now,
            access_count: 1,
            metadata: RelationshipMetadata::default(),
            ai_enriched: false,
        }
    }

    /// The endpoint that is not `id`, or `None` if `id` is not an endpoint.
    pub fn other(&self, id: Uuid) -> Option<Uuid> {
        if self.doc_a == id {
            Some(self.doc_b)
        } else if self.doc_b == id {
            Some(self.doc_a)
        } else {
            None
        }
    }

    pub fn touches(&self, id: Uuid) -> bool {
        self.doc_a == id || self.doc_b == id
    }
}

/// Orders a pair so (a, b) and (b, a) map to the same row.
pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Canonical, order-independent key for a document pair.
pub fn pair_key(a: Uuid, b: Uuid) -> String {
    let (lo, hi) = canonical_pair(a, b);
    format!("{}:{}", lo, hi)
}

// =============================================================================
// NAVIGATION EVENTS
// =============================================================================

/// Reference to a document as it was at navigation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: Uuid,
    pub url: String,
}

impl From<&TabDocument> for DocumentRef {
    fn from(doc: &TabDocument) -> Self {
        Self {
            id: doc.id,
            url: doc.url.clone(),
        }
    }
}

/// What initiated a tab switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NavigationTrigger {
    #[default]
    Suggestion,
    Keyboard,
    Workflow,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NavigationOutcome {
    pub was_helpful: Option<bool>,
    pub duration_on_target_ms: Option<u64>,
    pub returned_to_source: Option<bool>,
}

/// One tab-to-tab switch. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source: DocumentRef,
    pub destination: DocumentRef,
    pub trigger: NavigationTrigger,
    pub outcome: NavigationOutcome,
}

impl NavigationEvent {
    pub fn new(
        source: DocumentRef,
        destination: DocumentRef,
        trigger: NavigationTrigger,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            source,
            destination,
            trigger,
            outcome: NavigationOutcome::default(),
        }
    }
}

// =============================================================================
// WORKFLOW PATTERNS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    #[default]
    Sequential,
}

/// A repeated navigation sequence, materialized once seen often enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPattern {
    /// URLs in visit order, 2 to 5 entries.
    pub sequence: Vec<String>,
    pub frequency: u32,
    pub occurrences: Vec<OccurrenceWindow>,
    pub last_occurrence: DateTime<Utc>,
    /// Mean gap between one occurrence's end and the next one's start.
    pub avg_interval_ms: i64,
    pub confidence: f64,
    pub pattern_type: PatternType,
}

impl WorkflowPattern {
    pub fn chain_key(&self) -> String {
        chain_key(&self.sequence)
    }

    /// URL following `url` in the chain, if `url` sits at a non-terminal position.
    pub fn next_after(&self, url: &str) -> Option<&str> {
        self.sequence
            .windows(2)
            .find(|pair| pair[0] == url)
            .map(|pair| pair[1].as_str())
    }
}

pub fn chain_key(sequence: &[String]) -> String {
    sequence.join(defaults::WORKFLOW_CHAIN_SEPARATOR)
}

/// Saturating confidence for a workflow seen `frequency` times.
pub fn workflow_confidence(frequency: u32) -> f64 {
    (frequency as f64 / defaults::WORKFLOW_CONFIDENCE_SATURATION).min(1.0)
}

// =============================================================================
// STATS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Stats {
    pub total_tabs: usize,
    pub indexed_tabs: usize,
    pub relationship_count: usize,
    pub workflow_count: usize,
}
