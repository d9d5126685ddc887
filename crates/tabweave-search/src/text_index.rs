//! Incremental BM25 text index.
//!
//! Two corpus counters are kept. Document frequency is live: removing a
//! document rolls back exactly what adding it contributed. The lifetime term
//! counter only ever grows and is not consulted for ranking.
//!
//! Every map is ordered so that iteration, and therefore floating-point
//! accumulation, is identical before and after a serialize round trip.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use tabweave_core::{defaults, Result};

use crate::tokenizer::{is_ngram, ngrams, tokenize};

/// Caller-supplied fields carried alongside an indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DocumentMetadata {
    pub title: String,
    pub url: String,
    pub domain: String,
}

/// One corpus entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Filtered unigrams followed by the generated n-grams.
    pub terms: Vec<String>,
    pub term_freq: BTreeMap<String, u32>,
    pub unique_terms: usize,
    pub total_terms: usize,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TextIndex {
    documents: BTreeMap<Uuid, IndexedDocument>,
    doc_freq: BTreeMap<String, u32>,
    lifetime_term_freq: BTreeMap<String, u64>,
}

impl TextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.documents.contains_key(&id)
    }

    pub fn document(&self, id: Uuid) -> Option<&IndexedDocument> {
        self.documents.get(&id)
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.doc_freq.get(term).copied().unwrap_or(0)
    }

    /// How often `term` was ever tokenized into this index.
    pub fn lifetime_term_count(&self, term: &str) -> u64 {
        self.lifetime_term_freq.get(term).copied().unwrap_or(0)
    }

    /// Index `text` under `id`, replacing any previous entry for `id`.
    ///
    /// Unigrams are filtered against the corpus as it stands before this
    /// document is added; n-grams are built from the surviving unigrams.
    pub fn add_document(&mut self, id: Uuid, text: &str, metadata: DocumentMetadata) {
        self.remove_document(id);

        let tokens = tokenize(text);
        for token in &tokens {
            *self.lifetime_term_freq.entry(token.clone()).or_insert(0) += 1;
        }

        let mut terms = self.filter_terms(&tokens);
        let phrases = ngrams(&terms, defaults::NGRAM_MAX);
        terms.extend(phrases);

        let mut term_freq: BTreeMap<String, u32> = BTreeMap::new();
        for term in &terms {
            *term_freq.entry(term.clone()).or_insert(0) += 1;
        }
        for term in term_freq.keys() {
            *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
        }

        let document = IndexedDocument {
            unique_terms: term_freq.len(),
            total_terms: terms.len(),
            terms,
            term_freq,
            metadata,
        };
        self.documents.insert(id, document);
    }

    /// Remove `id` and roll back its document-frequency contribution.
    /// Returns whether the document existed.
    pub fn remove_document(&mut self, id: Uuid) -> bool {
        let Some(document) = self.documents.remove(&id) else {
            return false;
        };
        for term in document.term_freq.keys() {
            if let Some(count) = self.doc_freq.get_mut(term) {
                *count -= 1;
                if *count == 0 {
                    self.doc_freq.remove(term);
                }
            }
        }
        true
    }

    /// Drop tokens outside the length bounds, statistical stop words (once
    /// the corpus has enough documents) and single-document terms (once the
    /// corpus is large). Evaluated against the current corpus on every call.
    pub fn filter_terms(&self, tokens: &[String]) -> Vec<String> {
        let corpus_size = self.documents.len();
        let stop_word_limit = defaults::STOP_WORD_DF_RATIO * corpus_size as f64;
        tokens
            .iter()
            .filter(|token| {
                let len = token.chars().count();
                if !(defaults::TOKEN_MIN_LEN..=defaults::TOKEN_MAX_LEN).contains(&len) {
                    return false;
                }
                let df = self.document_frequency(token);
                if corpus_size >= defaults::STOP_WORD_MIN_DOCS && df as f64 > stop_word_limit {
                    return false;
                }
                !(corpus_size > defaults::RARE_TERM_MIN_DOCS && df == 1)
            })
            .cloned()
            .collect()
    }

    fn average_document_length(&self) -> f64 {
        if self.documents.is_empty() {
            return 0.0;
        }
        let total: usize = self.documents.values().map(|d| d.total_terms).sum();
        total as f64 / self.documents.len() as f64
    }

    fn bm25_idf(&self, term: &str) -> f64 {
        let n = self.documents.len() as f64;
        let df = self.document_frequency(term) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn classic_idf(&self, term: &str) -> f64 {
        let df = self.document_frequency(term);
        if df == 0 {
            return 0.0;
        }
        (self.documents.len() as f64 / df as f64).ln()
    }

    /// BM25 relevance of `query` to document `id`. Zero for an unknown
    /// document, an empty corpus, or no surviving shared terms.
    pub fn bm25(&self, query: &str, id: Uuid, k1: f64, b: f64) -> f64 {
        let Some(document) = self.documents.get(&id) else {
            return 0.0;
        };
        if self.documents.is_empty() {
            return 0.0;
        }
        let avg_len = self.average_document_length();
        let length_ratio = if avg_len > 0.0 {
            document.total_terms as f64 / avg_len
        } else {
            0.0
        };

        let mut score = 0.0;
        for term in self.filter_terms(&tokenize(query)) {
            let Some(&tf) = document.term_freq.get(&term) else {
                continue;
            };
            let tf = tf as f64;
            let idf = self.bm25_idf(&term);
            score += idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * length_ratio));
        }
        score.max(0.0)
    }

    /// Same as [`bm25`](Self::bm25).
    pub fn tfidf(&self, query: &str, id: Uuid, k1: f64, b: f64) -> f64 {
        self.bm25(query, id, k1, b)
    }

    fn weighted_vector(&self, document: &IndexedDocument, terms: &BTreeSet<&String>) -> Vec<f64> {
        let total = document.total_terms.max(1) as f64;
        terms
            .iter()
            .map(|term| {
                let tf = document.term_freq.get(*term).copied().unwrap_or(0) as f64 / total;
                tf * self.classic_idf(term)
            })
            .collect()
    }

    /// Cosine similarity of the tf-idf vectors of two indexed documents.
    pub fn cosine_similarity(&self, a: Uuid, b: Uuid) -> f64 {
        let (Some(doc_a), Some(doc_b)) = (self.documents.get(&a), self.documents.get(&b)) else {
            return 0.0;
        };
        let terms: BTreeSet<&String> = doc_a.term_freq.keys().chain(doc_b.term_freq.keys()).collect();
        let va = self.weighted_vector(doc_a, &terms);
        let vb = self.weighted_vector(doc_b, &terms);

        let dot: f64 = va.iter().zip(&vb).map(|(x, y)| x * y).sum();
        let mag_a = va.iter().map(|x| x * x).sum::<f64>().sqrt();
        let mag_b = vb.iter().map(|x| x * x).sum::<f64>().sqrt();
        if mag_a == 0.0 || mag_b == 0.0 {
            return 0.0;
        }
        (dot / (mag_a * mag_b)).clamp(0.0, 1.0)
    }

    /// The document's own unigrams ranked by tf·idf, for explanations.
    pub fn top_terms(&self, id: Uuid, n: usize) -> Vec<String> {
        let Some(document) = self.documents.get(&id) else {
            return Vec::new();
        };
        let total = document.total_terms.max(1) as f64;
        let mut scored: Vec<(&String, f64)> = document
            .term_freq
            .iter()
            .filter(|(term, _)| !is_ngram(term))
            .map(|(term, &tf)| (term, tf as f64 / total * self.bm25_idf(term)))
            .collect();
        scored.sort_by(|(ta, sa), (tb, sb)| sb.total_cmp(sa).then_with(|| ta.cmp(tb)));
        scored.into_iter().take(n).map(|(term, _)| term.clone()).collect()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const K1: f64 = defaults::BM25_K1;
    const B: f64 = defaults::BM25_B;

    fn corpus(texts: &[&str]) -> (TextIndex, Vec<Uuid>) {
        let mut index = TextIndex::new();
        let ids: Vec<Uuid> = texts
            .iter()
            .map(|text| {
                let id = Uuid::new_v4();
                index.add_document(id, text, DocumentMetadata::default());
                id
            })
            .collect();
        (index, ids)
    }

    #[test]
    fn test_add_builds_ngrams_and_counts() {
        let (index, ids) = corpus(&["apple banana cherry"]);
        let doc = index.document(ids[0]).unwrap();
        assert_eq!(doc.total_terms, 6);
        assert_eq!(doc.unique_terms, 6);
        assert_eq!(doc.term_freq["apple banana cherry"], 1);
        assert_eq!(index.document_frequency("banana cherry"), 1);
    }

    #[test]
    fn test_remove_restores_document_frequency() {
        let (mut index, _) = corpus(&["apple banana cherry", "banana cherry date"]);
        let before = index.doc_freq.clone();
        let id = Uuid::new_v4();
        index.add_document(id, "cherry date egg fig", DocumentMetadata::default());
        assert!(index.remove_document(id));
        assert_eq!(index.doc_freq, before);
        // The lifetime counter keeps the removed document's tokens.
        assert_eq!(index.lifetime_term_count("egg"), 1);
        assert!(!index.remove_document(id));
    }

    #[test]
    fn test_readd_replaces_previous_entry() {
        let (mut index, ids) = corpus(&["apple banana"]);
        index.add_document(ids[0], "cherry date", DocumentMetadata::default());
        assert_eq!(index.len(), 1);
        assert_eq!(index.document_frequency("apple"), 0);
        assert_eq!(index.document_frequency("cherry"), 1);
    }

    #[test]
    fn test_stop_words_filtered_from_three_documents() {
        let (index, _) = corpus(&["common alpha", "common beta"]);
        let tokens = vec!["common".to_string()];
        // Two documents: nothing is filtered yet.
        assert_eq!(index.filter_terms(&tokens), tokens);

        let (index, _) = corpus(&["common alpha", "common beta", "gamma delta"]);
        assert!(index.filter_terms(&tokens).is_empty());
    }

    #[test]
    fn test_single_document_terms_filtered_in_large_corpus() {
        let texts: Vec<String> = (0..11).map(|i| format!("shared{} unique{}", i % 5, i)).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let (index, _) = corpus(&refs);
        assert!(index.filter_terms(&["unique3".to_string()]).is_empty());
        assert_eq!(index.filter_terms(&["shared1".to_string()]), vec!["shared1"]);
    }

    #[test]
    fn test_length_bounds() {
        let index = TextIndex::new();
        let long = "x".repeat(31);
        let tokens = vec!["ab".to_string(), "abc".to_string(), long];
        assert_eq!(index.filter_terms(&tokens), vec!["abc"]);
    }

    #[test]
    fn test_bm25_matches_formula() {
        let (index, ids) = corpus(&["apple banana cherry", "banana cherry date", "cherry date egg"]);
        // "apple": df=1 in N=3 survives the filter; doc 1 has 6 terms, avg 6.
        let idf = ((3.0 - 1.0 + 0.5) / (1.0 + 0.5) + 1.0f64).ln();
        let expected = idf * (1.0 * (K1 + 1.0)) / (1.0 + K1 * (1.0 - B + B * 1.0));
        let score = index.bm25("apple", ids[0], K1, B);
        assert!((score - expected).abs() < 1e-12);
        assert_eq!(index.bm25("apple", ids[1], K1, B), 0.0);
    }

    #[test]
    fn test_bm25_unknown_document_and_empty_corpus() {
        let index = TextIndex::new();
        assert_eq!(index.bm25("anything", Uuid::new_v4(), K1, B), 0.0);
        let (index, _) = corpus(&["apple banana"]);
        assert_eq!(index.bm25("apple", Uuid::new_v4(), K1, B), 0.0);
    }

    #[test]
    fn test_bm25_non_negative_without_shared_terms() {
        let (index, ids) = corpus(&["apple banana", "cherry date", "egg fig"]);
        assert_eq!(index.bm25("zebra", ids[0], K1, B), 0.0);
        assert_eq!(index.tfidf("apple", ids[0], K1, B), index.bm25("apple", ids[0], K1, B));
        assert!(index.bm25("apple", ids[0], K1, B) >= 0.0);
    }

    #[test]
    fn test_repeated_query_terms_accumulate() {
        let (index, ids) = corpus(&["apple banana", "cherry date", "egg fig"]);
        let once = index.bm25("apple", ids[0], K1, B);
        let thrice = index.bm25("apple apple apple", ids[0], K1, B);
        assert!((thrice - 3.0 * once).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        let (index, ids) = corpus(&["apple banana cherry", "apple banana cherry", "egg fig grape"]);
        let same = index.cosine_similarity(ids[0], ids[1]);
        assert!((same - 1.0).abs() < 1e-9);
        assert_eq!(index.cosine_similarity(ids[0], ids[2]), 0.0);
        assert_eq!(index.cosine_similarity(ids[0], Uuid::new_v4()), 0.0);
    }

    #[test]
    fn test_top_terms_exclude_ngrams() {
        let (index, ids) = corpus(&["rust rust tokio runtime", "python django", "golang gin"]);
        let top = index.top_terms(ids[0], 5);
        assert_eq!(top[0], "rust");
        assert!(top.iter().all(|t| !is_ngram(t)));
        assert_eq!(top.len(), 3);
        assert!(index.top_terms(Uuid::new_v4(), 5).is_empty());
    }

    #[test]
    fn test_serialize_round_trip_preserves_scores() {
        let (index, ids) = corpus(&[
            "kubernetes deployment rollout guide",
            "deployment pipeline for kubernetes clusters",
            "sourdough bread recipe",
            "kubernetes helm chart reference",
        ]);
        let bytes = index.serialize().unwrap();
        let restored = TextIndex::deserialize(&bytes).unwrap();
        assert_eq!(restored, index);
        for &a in &ids {
            assert_eq!(
                restored.bm25("kubernetes deployment", a, K1, B),
                index.bm25("kubernetes deployment", a, K1, B)
            );
            for &b in &ids {
                assert_eq!(restored.cosine_similarity(a, b), index.cosine_similarity(a, b));
            }
        }
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(TextIndex::deserialize(b"not an index").is_err());
    }
}
