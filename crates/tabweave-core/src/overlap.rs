//! Case-folded set overlap between term lists (entities, topics).

use std::collections::BTreeSet;

fn folded(terms: &[String]) -> BTreeSet<String> {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Case-folded intersection, sorted.
pub fn shared_terms(a: &[String], b: &[String]) -> Vec<String> {
    let a = folded(a);
    let b = folded(b);
    a.intersection(&b).cloned().collect()
}

/// Jaccard similarity of the case-folded sets. Two empty sets score 0.
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    let a = folded(a);
    let b = folded(b);
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}
