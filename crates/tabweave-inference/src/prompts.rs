//! Prompt builders for the three AI capabilities.
//!
//! Each prompt asks for a fixed set of labeled lines that [`crate::parse`]
//! understands. Changing a label here means changing the parser with it.

use tabweave_core::DocumentType;

use crate::types::DocumentProfile;

pub const SUMMARY_SYSTEM: &str =
    "You summarize web pages for a tab organizer. Answer with the summary only.";

pub const EXTRACTION_SYSTEM: &str =
    "You extract structured metadata from web page summaries. Follow the output format exactly.";

pub const SIMILARITY_SYSTEM: &str =
    "You judge how related two browser tabs are. Follow the output format exactly.";

/// Summary request for cleaned page text.
pub fn summary_prompt(title: &str, text: &str) -> String {
    format!(
        r#"Summarize the following web page in 2-3 sentences. Focus on what the page is about and what a reader would use it for.

Title: {}

Content:
{}
"#,
        title, text
    )
}

/// Structured extraction request embedding a summary.
pub fn extraction_prompt(title: &str, summary: &str) -> String {
    let types: Vec<&str> = DocumentType::ALL.iter().map(|t| t.as_str()).collect();
    format!(
        r#"Extract metadata from this web page.

Title: {}
Summary: {}

Respond in the format:
KEYWORDS: <up to 10 comma-separated keywords>
ENTITIES: <comma-separated people, organizations, products, projects>
TOPICS: <up to 5 comma-separated broad topics>
TYPE: <one of: {}>
"#,
        title,
        summary,
        types.join(", ")
    )
}

fn profile_block(label: &str, profile: &DocumentProfile) -> String {
    format!(
        "{label}:\nTitle: {}\nSummary: {}\nKeywords: {}\nEntities: {}\nTopics: {}\n",
        profile.title,
        profile.summary,
        profile.keywords.join(", "),
        profile.entities.join(", "),
        profile.topics.join(", "),
    )
}

/// Semantic-similarity request for two document profiles.
pub fn similarity_prompt(a: &DocumentProfile, b: &DocumentProfile) -> String {
    format!(
        r#"Compare these two browser tabs.

{}
{}
Relationship types:
- SIMILAR: same subject matter
- COMPLEMENTARY: different material used together for one task
- SEQUENTIAL: one naturally follows the other
- UNRELATED: no meaningful connection

Respond in the format:
SIMILARITY_SCORE: <0.0-1.0>
RELATIONSHIP_TYPE: <type>
REASON: <one sentence>
"#,
        profile_block("Tab A", a),
        profile_block("Tab B", b)
    )
}
