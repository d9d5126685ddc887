//! Undirected weighted relationship graph over tab documents.
//!
//! One row per unordered pair, keyed by the canonical pair key. Strength only
//! grows through repeated interaction or the enrichment boost and only
//! shrinks through time decay; rows that fall under the delete threshold or
//! are judged spurious are removed, never kept at a floor.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use tabweave_core::{
    defaults, jaccard, pair_key, shared_terms, Error, Relationship, RelationshipRepository,
    RelationshipType, Result, TabDocument, TabDocumentRepository,
};
use tabweave_inference::{ContentAnalyzer, DocumentProfile};

/// Tunables for the relationship graph.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub strengthen_step: f64,
    pub jaccard_weight: f64,
    pub semantic_weight: f64,
    /// Semantic score under which an overlap-free relationship is pruned.
    pub prune_threshold: f64,
    /// Strength under which a decayed relationship is deleted.
    pub delete_threshold: f64,
    pub decay_per_week: f64,
    pub decay_max: f64,
    pub related_limit: usize,
    /// Delay between consecutive semantic-similarity calls.
    pub pacing: Duration,
    /// Shared entities plus shared topics needed to link two documents by content.
    pub min_shared_terms: usize,
    /// How many recently indexed documents a new document is compared against.
    pub recent_window: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            strengthen_step: defaults::RELATIONSHIP_STRENGTHEN_STEP,
            jaccard_weight: defaults::ENRICH_JACCARD_WEIGHT,
            semantic_weight: defaults::ENRICH_SEMANTIC_WEIGHT,
            prune_threshold: defaults::PRUNE_SEMANTIC_THRESHOLD,
            delete_threshold: defaults::RELATIONSHIP_DELETE_THRESHOLD,
            decay_per_week: defaults::DECAY_PER_WEEK,
            decay_max: defaults::DECAY_MAX,
            related_limit: defaults::RELATED_LIMIT,
            pacing: Duration::from_millis(defaults::SEMANTIC_PACING_MS),
            min_shared_terms: defaults::CONTENT_OVERLAP_MIN_SHARED,
            recent_window: defaults::RECENT_RELATIONSHIP_WINDOW,
        }
    }
}

impl GraphConfig {
    /// Set the delay between semantic-similarity calls.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_related_limit(mut self, limit: usize) -> Self {
        self.related_limit = limit;
        self
    }

    pub fn with_recent_window(mut self, window: usize) -> Self {
        self.recent_window = window;
        self
    }
}

/// The other endpoint of a relationship, resolved to its document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedTab {
    pub document: TabDocument,
    pub strength: f64,
    pub relationship_type: RelationshipType,
    pub shared_entities: Vec<String>,
    pub shared_topics: Vec<String>,
}

/// Outcome counters of one semantic-enrichment sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentSweep {
    pub examined: usize,
    /// Relationships judged by the AI capability and flagged enriched.
    pub enriched: usize,
    /// Relationships with only one enriched side: overlap refreshed, not flagged.
    pub partial: usize,
    pub pruned: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome counters of one decay sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecaySweep {
    pub examined: usize,
    pub decayed: usize,
    pub deleted: usize,
    /// Rows whose write-back failed; they are retried on the next sweep.
    pub failed: usize,
}

/// Shared entities/topics and their mean Jaccard score for a document pair.
struct ContentOverlap {
    shared_entities: Vec<String>,
    shared_topics: Vec<String>,
    jaccard: f64,
}

impl ContentOverlap {
    fn between(a: &TabDocument, b: &TabDocument) -> Self {
        let entity_jaccard = jaccard(a.entities(), b.entities());
        let topic_jaccard = jaccard(a.topics(), b.topics());
        Self {
            shared_entities: shared_terms(a.entities(), b.entities()),
            shared_topics: shared_terms(a.topics(), b.topics()),
            jaccard: (entity_jaccard + topic_jaccard) / 2.0,
        }
    }

    fn shared_count(&self) -> usize {
        self.shared_entities.len() + self.shared_topics.len()
    }
}

/// Relationship graph backed by the relationship and document stores.
pub struct RelationshipGraph {
    relationships: Arc<dyn RelationshipRepository>,
    documents: Arc<dyn TabDocumentRepository>,
    config: GraphConfig,
}

impl RelationshipGraph {
    pub fn new(
        relationships: Arc<dyn RelationshipRepository>,
        documents: Arc<dyn TabDocumentRepository>,
    ) -> Self {
        Self::with_config(relationships, documents, GraphConfig::default())
    }

    pub fn with_config(
        relationships: Arc<dyn RelationshipRepository>,
        documents: Arc<dyn TabDocumentRepository>,
        config: GraphConfig,
    ) -> Self {
        Self {
            relationships,
            documents,
            config,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Record an interaction between two documents: insert at base strength
    /// or strengthen an existing row.
    #[instrument(skip(self), fields(subsystem = "graph", component = "relationships", op = "create_or_strengthen"))]
    pub async fn create_or_strengthen(
        &self,
        a: Uuid,
        b: Uuid,
        reason: RelationshipType,
        now: DateTime<Utc>,
    ) -> Result<Relationship> {
        if a == b {
            return Err(Error::InvalidInput(
                "a relationship needs two distinct documents".to_string(),
            ));
        }
        let key = pair_key(a, b);
        let relationship = match self.relationships.get(&key).await? {
            Some(mut existing) => {
                existing.strength = (existing.strength + self.config.strengthen_step).min(1.0);
                existing.access_count = existing.access_count.saturating_add(1);
                existing.last_accessed_at = now;
                existing.metadata.decay_applied = 0.0;
                debug!(pair_key = %key, strength = existing.strength, "Relationship strengthened");
                existing
            }
            None => {
                let created = Relationship::new(a, b, reason, now);
                debug!(pair_key = %key, strength = created.strength, "Relationship created");
                created
            }
        };
        self.relationships.upsert(&relationship).await?;
        Ok(relationship)
    }

    /// The relationship between two documents, if any.
    pub async fn between(&self, a: Uuid, b: Uuid) -> Result<Option<Relationship>> {
        if a == b {
            return Ok(None);
        }
        self.relationships.get(&pair_key(a, b)).await
    }

    /// Link enriched documents whose entities or topics overlap. Existing
    /// rows only get their shared lists refreshed; content overlap is not an
    /// interaction and never strengthens.
    #[instrument(skip(self, docs), fields(subsystem = "graph", component = "relationships", op = "initialize_from_content", candidate_count = docs.len()))]
    pub async fn initialize_from_content(
        &self,
        docs: &[TabDocument],
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let enriched: Vec<&TabDocument> = docs.iter().filter(|d| d.is_enriched()).collect();
        let mut created = 0;
        for (i, a) in enriched.iter().enumerate() {
            for b in &enriched[i + 1..] {
                if self.link_by_content(a, b, now).await? {
                    created += 1;
                }
            }
        }
        info!(result_count = created, "Content relationships initialized");
        Ok(created)
    }

    /// Compare one newly enriched document against the most recently indexed
    /// ones only.
    #[instrument(skip(self, doc), fields(subsystem = "graph", component = "relationships", op = "connect_recent", doc_id = %doc.id))]
    pub async fn connect_recent(&self, doc: &TabDocument, now: DateTime<Utc>) -> Result<usize> {
        if !doc.is_enriched() {
            return Ok(0);
        }
        let recent = self
            .documents
            .list_recently_indexed(self.config.recent_window + 1)
            .await?;
        let mut created = 0;
        for other in recent
            .iter()
            .filter(|o| o.id != doc.id)
            .take(self.config.recent_window)
        {
            if self.link_by_content(doc, other, now).await? {
                created += 1;
            }
        }
        debug!(result_count = created, "Recent content relationships created");
        Ok(created)
    }

    /// Returns whether a new row was created.
    async fn link_by_content(
        &self,
        a: &TabDocument,
        b: &TabDocument,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if a.id == b.id {
            return Ok(false);
        }
        let overlap = ContentOverlap::between(a, b);
        if overlap.shared_count() < self.config.min_shared_terms {
            return Ok(false);
        }
        let key = pair_key(a.id, b.id);
        let (mut relationship, is_new) = match self.relationships.get(&key).await? {
            Some(existing) => (existing, false),
            None => (
                Relationship::new(a.id, b.id, RelationshipType::Content, now),
                true,
            ),
        };
        relationship.metadata.shared_entities = overlap.shared_entities;
        relationship.metadata.shared_topics = overlap.shared_topics;
        self.relationships.upsert(&relationship).await?;
        Ok(is_new)
    }

    /// Sweep every relationship not yet AI-enriched.
    ///
    /// Needs content on at least one side. When both sides are enriched and
    /// the capability is available, the pair is judged semantically and the
    /// row is either boosted and flagged enriched, or deleted when the
    /// judgment is weak and nothing is shared. A failed judgment or storage
    /// call for one row is logged, counted in `failed`, and the sweep moves on.
    #[instrument(skip(self, analyzer), fields(subsystem = "graph", component = "relationships", op = "enrich_with_semantics"))]
    pub async fn enrich_with_semantics(&self, analyzer: &ContentAnalyzer) -> Result<EnrichmentSweep> {
        let start = Instant::now();
        let pending = self.relationships.list_unenriched().await?;
        let mut sweep = EnrichmentSweep::default();
        let mut judged_any = false;

        for candidate in pending {
            sweep.examined += 1;
            // Rows may vanish while the sweep runs.
            let mut relationship = match self.relationships.get(&candidate.id).await {
                Ok(Some(relationship)) => relationship,
                Ok(None) => {
                    sweep.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(pair_key = %candidate.id, error = %e, "Failed to reload relationship, skipping");
                    sweep.failed += 1;
                    continue;
                }
            };
            if relationship.ai_enriched {
                sweep.skipped += 1;
                continue;
            }
            let endpoints = match self.documents.get(relationship.doc_a).await {
                Ok(a) => self.documents.get(relationship.doc_b).await.map(|b| (a, b)),
                Err(e) => Err(e),
            };
            let (doc_a, doc_b) = match endpoints {
                Ok((Some(a), Some(b))) => (a, b),
                Err(e) => {
                    warn!(pair_key = %relationship.id, error = %e, "Failed to load relationship documents, skipping");
                    sweep.failed += 1;
                    continue;
                }
                Ok(_) => {
                    debug!(pair_key = %relationship.id, skip_reason = "missing_document", "Skipping relationship");
                    sweep.skipped += 1;
                    continue;
                }
            };
            if !doc_a.is_enriched() && !doc_b.is_enriched() {
                sweep.skipped += 1;
                continue;
            }

            let overlap = ContentOverlap::between(&doc_a, &doc_b);
            // Only the part of the Jaccard score not already credited is added.
            let jaccard_gain = (overlap.jaccard - relationship.metadata.cooccurrence_score).max(0.0);

            let judgment = if doc_a.is_enriched() && doc_b.is_enriched() && analyzer.is_available() {
                if judged_any && !self.config.pacing.is_zero() {
                    tokio::time::sleep(self.config.pacing).await;
                }
                judged_any = true;
                match analyzer
                    .judge_similarity(&DocumentProfile::from(&doc_a), &DocumentProfile::from(&doc_b))
                    .await
                {
                    Ok(judgment) => Some(judgment),
                    Err(e) => {
                        warn!(pair_key = %relationship.id, error = %e, "Semantic judgment failed, skipping relationship");
                        sweep.failed += 1;
                        continue;
                    }
                }
            } else {
                None
            };

            let nothing_shared = overlap.shared_count() == 0;
            relationship.metadata.shared_entities = overlap.shared_entities;
            relationship.metadata.shared_topics = overlap.shared_topics;
            relationship.metadata.cooccurrence_score =
                relationship.metadata.cooccurrence_score.max(overlap.jaccard);

            match judgment {
                Some(judgment) => {
                    if judgment.score < self.config.prune_threshold && nothing_shared {
                        debug!(pair_key = %relationship.id, semantic_score = judgment.score, "Pruning spurious relationship");
                        match self.relationships.delete(&relationship.id).await {
                            Ok(_) => sweep.pruned += 1,
                            Err(e) => {
                                warn!(pair_key = %relationship.id, error = %e, "Failed to prune relationship");
                                sweep.failed += 1;
                            }
                        }
                        continue;
                    }
                    relationship.strength = (relationship.strength
                        + jaccard_gain * self.config.jaccard_weight
                        + judgment.score * self.config.semantic_weight)
                        .clamp(0.0, 1.0);
                    if judgment.relationship_type != RelationshipType::Unrelated {
                        relationship.relationship_type = judgment.relationship_type;
                    }
                    relationship.metadata.semantic_score = Some(judgment.score);
                    relationship.metadata.reason =
                        Some(judgment.reason).filter(|r| !r.is_empty());
                    relationship.ai_enriched = true;
                }
                None => {
                    relationship.strength = (relationship.strength
                        + jaccard_gain * self.config.jaccard_weight)
                        .clamp(0.0, 1.0);
                }
            }
            if let Err(e) = self.relationships.upsert(&relationship).await {
                warn!(pair_key = %relationship.id, error = %e, "Failed to store enriched relationship");
                sweep.failed += 1;
                continue;
            }
            if relationship.ai_enriched {
                sweep.enriched += 1;
            } else {
                sweep.partial += 1;
            }
        }

        info!(
            examined = sweep.examined,
            enriched = sweep.enriched,
            partial = sweep.partial,
            pruned = sweep.pruned,
            failed = sweep.failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Semantic enrichment sweep complete"
        );
        Ok(sweep)
    }

    /// Weaken relationships idle for at least a week and delete those that
    /// fall under the delete threshold.
    ///
    /// The decay owed is `min(whole weeks idle * per-week, max)`; only the
    /// part not already subtracted since the last interaction is applied, so
    /// running the sweep daily does not compound. A row whose write fails is
    /// counted in `failed` and left as it was.
    #[instrument(skip(self), fields(subsystem = "graph", component = "relationships", op = "decay"))]
    pub async fn decay(&self, now: DateTime<Utc>) -> Result<DecaySweep> {
        let mut sweep = DecaySweep::default();
        for mut relationship in self.relationships.list_all().await? {
            sweep.examined += 1;
            let weeks = (now - relationship.last_accessed_at).num_weeks();
            if weeks < 1 {
                continue;
            }
            let owed = (weeks as f64 * self.config.decay_per_week).min(self.config.decay_max);
            let delta = owed - relationship.metadata.decay_applied;
            if delta <= 0.0 {
                continue;
            }
            relationship.strength = (relationship.strength - delta).max(0.0);
            relationship.metadata.decay_applied = owed;

            if relationship.strength < self.config.delete_threshold {
                debug!(pair_key = %relationship.id, strength = relationship.strength, "Deleting decayed relationship");
                match self.relationships.delete(&relationship.id).await {
                    Ok(_) => sweep.deleted += 1,
                    Err(e) => {
                        warn!(pair_key = %relationship.id, error = %e, "Failed to delete decayed relationship");
                        sweep.failed += 1;
                    }
                }
            } else {
                match self.relationships.upsert(&relationship).await {
                    Ok(()) => sweep.decayed += 1,
                    Err(e) => {
                        warn!(pair_key = %relationship.id, error = %e, "Failed to store decayed relationship");
                        sweep.failed += 1;
                    }
                }
            }
        }
        info!(
            examined = sweep.examined,
            decayed = sweep.decayed,
            deleted = sweep.deleted,
            failed = sweep.failed,
            "Relationship decay complete"
        );
        Ok(sweep)
    }

    /// Strongest relationships touching `doc_id`, strength descending,
    /// resolved to the other endpoint.
    pub async fn related_to(&self, doc_id: Uuid, min_strength: f64) -> Result<Vec<RelatedTab>> {
        let mut rows: Vec<Relationship> = self
            .relationships
            .list_for_document(doc_id)
            .await?
            .into_iter()
            .filter(|r| r.strength >= min_strength)
            .collect();
        rows.sort_by(|a, b| b.strength.total_cmp(&a.strength).then_with(|| a.id.cmp(&b.id)));

        let mut related = Vec::new();
        for relationship in rows {
            if related.len() >= self.config.related_limit {
                break;
            }
            let Some(other_id) = relationship.other(doc_id) else {
                continue;
            };
            let Some(document) = self.documents.get(other_id).await? else {
                continue;
            };
            related.push(RelatedTab {
                document,
                strength: relationship.strength,
                relationship_type: relationship.relationship_type,
                shared_entities: relationship.metadata.shared_entities,
                shared_topics: relationship.metadata.shared_topics,
            });
        }
        Ok(related)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tabweave_core::{TabContent, TabSnapshot};
    use tabweave_db::Database;
    use tabweave_inference::mock::MockGenerationBackend;
    use tabweave_inference::AiSession;

    fn graph(db: &Database) -> RelationshipGraph {
        RelationshipGraph::with_config(
            db.relationships.clone(),
            db.documents.clone(),
            GraphConfig::default().with_pacing(Duration::ZERO),
        )
    }

    fn lite(handle: i64) -> TabDocument {
        TabDocument::lite(
            &TabSnapshot::new(handle, format!("Tab {}", handle), format!("https://example.com/{}", handle)),
            Utc::now(),
        )
    }

    fn enriched(handle: i64, entities: &[&str], topics: &[&str]) -> TabDocument {
        let mut doc = lite(handle);
        doc.content = Some(TabContent {
            summary: format!("Summary {}", handle),
            entities: entities.iter().map(|s| s.to_string()).collect(),
            topics: topics.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        });
        doc.is_indexed = true;
        doc.last_indexed_at = Some(Utc::now());
        doc
    }

    fn analyzer(response: &str) -> ContentAnalyzer {
        let backend = MockGenerationBackend::new().with_response_containing("SIMILARITY_SCORE", response);
        ContentAnalyzer::new(AiSession::from_backend(Arc::new(backend)))
    }

    #[tokio::test]
    async fn test_create_then_strengthen() {
        let db = Database::in_memory().await.unwrap();
        let g = graph(&db);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        let created = g.create_or_strengthen(a, b, RelationshipType::Navigation, now).await.unwrap();
        assert_eq!(created.strength, defaults::RELATIONSHIP_BASE_STRENGTH);
        assert_eq!(created.access_count, 1);

        let strengthened = g.create_or_strengthen(b, a, RelationshipType::Navigation, now).await.unwrap();
        assert!((strengthened.strength - 0.4).abs() < 1e-9);
        assert_eq!(strengthened.access_count, 2);
        assert_eq!(db.relationships.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_strength_caps_at_one() {
        let db = Database::in_memory().await.unwrap();
        let g = graph(&db);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        for _ in 0..20 {
            g.create_or_strengthen(a, b, RelationshipType::Navigation, Utc::now()).await.unwrap();
        }
        assert_eq!(g.between(a, b).await.unwrap().unwrap().strength, 1.0);
    }

    #[tokio::test]
    async fn test_self_relationship_rejected() {
        let db = Database::in_memory().await.unwrap();
        let a = Uuid::new_v4();
        let err = graph(&db)
            .create_or_strengthen(a, a, RelationshipType::Navigation, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_initialize_requires_shared_terms() {
        let db = Database::in_memory().await.unwrap();
        let a = enriched(1, &["Acme"], &["finance"]);
        let b = enriched(2, &["acme"], &["travel"]);
        let c = enriched(3, &["Globex"], &["cooking"]);
        let docs = vec![a.clone(), b.clone(), c.clone(), lite(4)];

        let created = graph(&db).initialize_from_content(&docs, Utc::now()).await.unwrap();
        assert_eq!(created, 1);
        let rel = graph(&db).between(a.id, b.id).await.unwrap().unwrap();
        assert_eq!(rel.relationship_type, RelationshipType::Content);
        assert_eq!(rel.metadata.shared_entities, vec!["acme"]);
        assert!(graph(&db).between(a.id, c.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let docs = vec![enriched(1, &["Acme"], &[]), enriched(2, &["Acme"], &[])];
        let g = graph(&db);
        g.initialize_from_content(&docs, Utc::now()).await.unwrap();
        let again = g.initialize_from_content(&docs, Utc::now()).await.unwrap();
        assert_eq!(again, 0);
        let rel = g.between(docs[0].id, docs[1].id).await.unwrap().unwrap();
        assert_eq!(rel.strength, defaults::RELATIONSHIP_BASE_STRENGTH);
    }

    #[tokio::test]
    async fn test_connect_recent_skips_self_and_unenriched() {
        let db = Database::in_memory().await.unwrap();
        let existing = enriched(1, &["Rust"], &["programming"]);
        let fresh = enriched(2, &["Rust"], &[]);
        db.documents.insert(existing.clone()).await.unwrap();
        db.documents.insert(fresh.clone()).await.unwrap();
        let g = graph(&db);

        assert_eq!(g.connect_recent(&fresh, Utc::now()).await.unwrap(), 1);
        assert_eq!(g.connect_recent(&lite(3), Utc::now()).await.unwrap(), 0);
        assert!(g.between(existing.id, fresh.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_enrichment_boosts_and_flags() {
        let db = Database::in_memory().await.unwrap();
        let a = enriched(1, &["Acme"], &["finance"]);
        let b = enriched(2, &["Acme"], &["finance"]);
        db.documents.insert(a.clone()).await.unwrap();
        db.documents.insert(b.clone()).await.unwrap();
        let g = graph(&db);
        g.create_or_strengthen(a.id, b.id, RelationshipType::Navigation, Utc::now()).await.unwrap();

        let sweep = g
            .enrich_with_semantics(&analyzer("SIMILARITY_SCORE: 0.5\nRELATIONSHIP_TYPE: complementary\nREASON: Same deal."))
            .await
            .unwrap();
        assert_eq!(sweep.enriched, 1);

        let rel = g.between(a.id, b.id).await.unwrap().unwrap();
        // 0.3 + 1.0 * 0.3 + 0.5 * 0.4
        assert!((rel.strength - 0.8).abs() < 1e-9);
        assert!(rel.ai_enriched);
        assert_eq!(rel.relationship_type, RelationshipType::Complementary);
        assert_eq!(rel.metadata.semantic_score, Some(0.5));
        assert_eq!(rel.metadata.reason.as_deref(), Some("Same deal."));

        // Already enriched rows are not touched again.
        let again = g.enrich_with_semantics(&analyzer("SIMILARITY_SCORE: 1")).await.unwrap();
        assert_eq!(again.examined, 0);
    }

    #[tokio::test]
    async fn test_enrichment_never_exceeds_one() {
        let db = Database::in_memory().await.unwrap();
        let a = enriched(1, &["Acme"], &["finance"]);
        let b = enriched(2, &["Acme"], &["finance"]);
        db.documents.insert(a.clone()).await.unwrap();
        db.documents.insert(b.clone()).await.unwrap();
        let g = graph(&db);
        for _ in 0..6 {
            g.create_or_strengthen(a.id, b.id, RelationshipType::Navigation, Utc::now()).await.unwrap();
        }
        g.enrich_with_semantics(&analyzer("SIMILARITY_SCORE: 1.0\nRELATIONSHIP_TYPE: similar"))
            .await
            .unwrap();
        assert_eq!(g.between(a.id, b.id).await.unwrap().unwrap().strength, 1.0);
    }

    #[tokio::test]
    async fn test_one_sided_enrichment_not_flagged() {
        let db = Database::in_memory().await.unwrap();
        let a = enriched(1, &["Acme"], &[]);
        let b = lite(2);
        db.documents.insert(a.clone()).await.unwrap();
        db.documents.insert(b.clone()).await.unwrap();
        let g = graph(&db);
        g.create_or_strengthen(a.id, b.id, RelationshipType::Navigation, Utc::now()).await.unwrap();

        let backend = MockGenerationBackend::new();
        let analyzer = ContentAnalyzer::new(AiSession::from_backend(Arc::new(backend.clone())));
        let sweep = g.enrich_with_semantics(&analyzer).await.unwrap();

        assert_eq!(sweep.partial, 1);
        assert_eq!(backend.call_count(), 0);
        let rel = g.between(a.id, b.id).await.unwrap().unwrap();
        assert!(!rel.ai_enriched);
        assert_eq!(rel.strength, defaults::RELATIONSHIP_BASE_STRENGTH);
    }

    #[tokio::test]
    async fn test_neither_side_enriched_is_skipped() {
        let db = Database::in_memory().await.unwrap();
        let (a, b) = (lite(1), lite(2));
        db.documents.insert(a.clone()).await.unwrap();
        db.documents.insert(b.clone()).await.unwrap();
        let g = graph(&db);
        g.create_or_strengthen(a.id, b.id, RelationshipType::Navigation, Utc::now()).await.unwrap();

        let sweep = g.enrich_with_semantics(&ContentAnalyzer::unavailable()).await.unwrap();
        assert_eq!(sweep.skipped, 1);
    }

    #[tokio::test]
    async fn test_failed_judgment_does_not_abort_sweep() {
        let db = Database::in_memory().await.unwrap();
        let docs: Vec<TabDocument> = (1..=3).map(|h| enriched(h, &["Acme"], &[])).collect();
        for d in &docs {
            db.documents.insert(d.clone()).await.unwrap();
        }
        let g = graph(&db);
        g.create_or_strengthen(docs[0].id, docs[1].id, RelationshipType::Navigation, Utc::now()).await.unwrap();
        g.create_or_strengthen(docs[0].id, docs[2].id, RelationshipType::Navigation, Utc::now()).await.unwrap();

        let backend = MockGenerationBackend::new()
            .failing_on("Summary 2")
            .with_response_containing("SIMILARITY_SCORE", "SIMILARITY_SCORE: 0.9\nRELATIONSHIP_TYPE: similar");
        let analyzer = ContentAnalyzer::new(AiSession::from_backend(Arc::new(backend)));
        let sweep = g.enrich_with_semantics(&analyzer).await.unwrap();

        assert_eq!(sweep.failed, 1);
        assert_eq!(sweep.enriched, 1);
        assert!(!g.between(docs[0].id, docs[1].id).await.unwrap().unwrap().ai_enriched);
        assert!(g.between(docs[0].id, docs[2].id).await.unwrap().unwrap().ai_enriched);
    }

    #[tokio::test]
    async fn test_decay_applies_after_a_week_without_compounding() {
        let db = Database::in_memory().await.unwrap();
        let g = graph(&db);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let start = Utc::now();
        for _ in 0..3 {
            g.create_or_strengthen(a, b, RelationshipType::Navigation, start).await.unwrap();
        }
        // strength 0.5

        let sweep = g.decay(start + ChronoDuration::days(6)).await.unwrap();
        assert_eq!(sweep.decayed, 0);

        g.decay(start + ChronoDuration::days(15)).await.unwrap();
        let rel = g.between(a, b).await.unwrap().unwrap();
        assert!((rel.strength - 0.4).abs() < 1e-9);

        // Same elapsed weeks: nothing more owed.
        g.decay(start + ChronoDuration::days(16)).await.unwrap();
        assert!((g.between(a, b).await.unwrap().unwrap().strength - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_decay_deletes_below_threshold() {
        let db = Database::in_memory().await.unwrap();
        let g = graph(&db);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let start = Utc::now();
        g.create_or_strengthen(a, b, RelationshipType::Navigation, start).await.unwrap();

        let sweep = g.decay(start + ChronoDuration::weeks(10)).await.unwrap();
        assert_eq!(sweep.deleted, 1);
        assert!(g.between(a, b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_related_to_filters_orders_and_resolves() {
        let db = Database::in_memory().await.unwrap();
        let center = lite(1);
        let strong = lite(2);
        let weak = lite(3);
        for d in [&center, &strong, &weak] {
            db.documents.insert(d.clone()).await.unwrap();
        }
        let g = graph(&db);
        let now = Utc::now();
        g.create_or_strengthen(center.id, weak.id, RelationshipType::Navigation, now).await.unwrap();
        for _ in 0..3 {
            g.create_or_strengthen(center.id, strong.id, RelationshipType::Navigation, now).await.unwrap();
        }

        let related = g.related_to(center.id, 0.3).await.unwrap();
        let ids: Vec<Uuid> = related.iter().map(|r| r.document.id).collect();
        assert_eq!(ids, vec![strong.id, weak.id]);

        let strict = g.related_to(center.id, 0.45).await.unwrap();
        assert_eq!(strict.len(), 1);
    }

    #[tokio::test]
    async fn test_related_to_respects_limit() {
        let db = Database::in_memory().await.unwrap();
        let center = lite(0);
        db.documents.insert(center.clone()).await.unwrap();
        let g = RelationshipGraph::with_config(
            db.relationships.clone(),
            db.documents.clone(),
            GraphConfig::default().with_related_limit(2),
        );
        for h in 1..=4 {
            let other = lite(h);
            db.documents.insert(other.clone()).await.unwrap();
            g.create_or_strengthen(center.id, other.id, RelationshipType::Navigation, Utc::now())
                .await
                .unwrap();
        }
        assert_eq!(g.related_to(center.id, 0.0).await.unwrap().len(), 2);
    }

    /// Delegates to the real store but refuses writes for one pair.
    struct WriteRefusingRelationships {
        inner: Arc<dyn RelationshipRepository>,
        refused: String,
    }

    impl WriteRefusingRelationships {
        fn refuse(&self, key: &str) -> Result<()> {
            if key == self.refused {
                return Err(Error::Storage(format!("disk full writing {}", key)));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl RelationshipRepository for WriteRefusingRelationships {
        async fn get(&self, pair_key: &str) -> Result<Option<Relationship>> {
            self.inner.get(pair_key).await
        }

        async fn upsert(&self, relationship: &Relationship) -> Result<()> {
            self.refuse(&relationship.id)?;
            self.inner.upsert(relationship).await
        }

        async fn delete(&self, pair_key: &str) -> Result<bool> {
            self.refuse(pair_key)?;
            self.inner.delete(pair_key).await
        }

        async fn list_all(&self) -> Result<Vec<Relationship>> {
            self.inner.list_all().await
        }

        async fn list_unenriched(&self) -> Result<Vec<Relationship>> {
            self.inner.list_unenriched().await
        }

        async fn list_for_document(&self, doc_id: Uuid) -> Result<Vec<Relationship>> {
            self.inner.list_for_document(doc_id).await
        }

        async fn count(&self) -> Result<usize> {
            self.inner.count().await
        }
    }

    fn refusing_graph(db: &Database, refused: String) -> RelationshipGraph {
        let relationships = Arc::new(WriteRefusingRelationships {
            inner: db.relationships.clone(),
            refused,
        });
        RelationshipGraph::with_config(
            relationships,
            db.documents.clone(),
            GraphConfig::default().with_pacing(Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn test_decay_write_failure_is_counted_and_sweep_continues() {
        let db = Database::in_memory().await.unwrap();
        let g = graph(&db);
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let start = Utc::now();
        for _ in 0..3 {
            g.create_or_strengthen(a, b, RelationshipType::Navigation, start).await.unwrap();
            g.create_or_strengthen(c, d, RelationshipType::Navigation, start).await.unwrap();
        }

        let later = start + ChronoDuration::days(15);
        let sweep = refusing_graph(&db, pair_key(a, b)).decay(later).await.unwrap();
        assert_eq!(sweep.examined, 2);
        assert_eq!(sweep.decayed, 1);
        assert_eq!(sweep.failed, 1);
        assert!((g.between(a, b).await.unwrap().unwrap().strength - 0.5).abs() < 1e-9);
        assert!((g.between(c, d).await.unwrap().unwrap().strength - 0.4).abs() < 1e-9);

        // The refused row is picked up by the next sweep.
        let retry = g.decay(later).await.unwrap();
        assert_eq!(retry.decayed, 1);
        assert!((g.between(a, b).await.unwrap().unwrap().strength - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_decay_delete_failure_keeps_row() {
        let db = Database::in_memory().await.unwrap();
        let g = graph(&db);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let start = Utc::now();
        g.create_or_strengthen(a, b, RelationshipType::Navigation, start).await.unwrap();

        let sweep = refusing_graph(&db, pair_key(a, b))
            .decay(start + ChronoDuration::weeks(10))
            .await
            .unwrap();
        assert_eq!(sweep.deleted, 0);
        assert_eq!(sweep.failed, 1);
        assert!(g.between(a, b).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_enrichment_write_failure_is_counted_and_sweep_continues() {
        let db = Database::in_memory().await.unwrap();
        let docs: Vec<TabDocument> = (1..=3).map(|h| enriched(h, &["Acme"], &[])).collect();
        for d in &docs {
            db.documents.insert(d.clone()).await.unwrap();
        }
        let g = graph(&db);
        g.create_or_strengthen(docs[0].id, docs[1].id, RelationshipType::Navigation, Utc::now()).await.unwrap();
        g.create_or_strengthen(docs[0].id, docs[2].id, RelationshipType::Navigation, Utc::now()).await.unwrap();

        let sweep = refusing_graph(&db, pair_key(docs[0].id, docs[1].id))
            .enrich_with_semantics(&analyzer("SIMILARITY_SCORE: 0.9\nRELATIONSHIP_TYPE: similar"))
            .await
            .unwrap();
        assert_eq!(sweep.examined, 2);
        assert_eq!(sweep.failed, 1);
        assert_eq!(sweep.enriched, 1);
        assert!(!g.between(docs[0].id, docs[1].id).await.unwrap().unwrap().ai_enriched);
        assert!(g.between(docs[0].id, docs[2].id).await.unwrap().unwrap().ai_enriched);
        assert_eq!(db.relationships.list_unenriched().await.unwrap().len(), 1);
    }
}
