//! Request and response types crossing the AI capability boundary.

use serde::{Deserialize, Serialize};

use tabweave_core::{DocumentType, RelationshipType, TabDocument};

/// What the similarity capability sees of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DocumentProfile {
    pub title: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub entities: Vec<String>,
    pub topics: Vec<String>,
}

impl From<&TabDocument> for DocumentProfile {
    fn from(doc: &TabDocument) -> Self {
        Self {
            title: doc.title.clone(),
            summary: doc.summary().unwrap_or_default().to_string(),
            keywords: doc.keywords().to_vec(),
            entities: doc.entities().to_vec(),
            topics: doc.topics().to_vec(),
        }
    }
}

/// Parsed structured extraction. Missing sections are empty / `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExtractedMetadata {
    pub keywords: Vec<String>,
    pub entities: Vec<String>,
    pub topics: Vec<String>,
    pub document_type: DocumentType,
}

/// Parsed similarity judgment. Unparseable input yields 0 / unrelated / "".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityJudgment {
    pub score: f64,
    pub relationship_type: RelationshipType,
    pub reason: String,
}

impl SimilarityJudgment {
    /// Creates a judgment, clamping the score to [0.0, 1.0].
    pub fn new(score: f64, relationship_type: RelationshipType, reason: String) -> Self {
        let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            score,
            relationship_type,
            reason,
        }
    }
}

impl Default for SimilarityJudgment {
    fn default() -> Self {
        Self::new(0.0, RelationshipType::Unrelated, String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_judgment_score_clamping() {
        assert_eq!(SimilarityJudgment::new(1.7, RelationshipType::Similar, String::new()).score, 1.0);
        assert_eq!(SimilarityJudgment::new(-0.2, RelationshipType::Similar, String::new()).score, 0.0);
        assert_eq!(SimilarityJudgment::new(f64::NAN, RelationshipType::Similar, String::new()).score, 0.0);
    }

    #[test]
    fn test_default_judgment_is_unrelated() {
        let judgment = SimilarityJudgment::default();
        assert_eq!(judgment.score, 0.0);
        assert_eq!(judgment.relationship_type, RelationshipType::Unrelated);
        assert!(judgment.reason.is_empty());
    }
}
