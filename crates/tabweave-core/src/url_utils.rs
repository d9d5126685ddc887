//! URL normalization, identity hashing and application detection.

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use url::Url;

use crate::models::DocumentType;

/// Query parameters that identify a campaign or click, not a page.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "msclkid", "mc_eid", "ref_src"];

/// Normalize a URL for identity: lowercase scheme and host, drop the
/// fragment and tracking parameters, drop a trailing slash on non-root paths.
///
/// Strings that do not parse as URLs are returned trimmed.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => return trimmed.to_string(),
    };

    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| {
                let key = k.to_lowercase();
                !key.starts_with("utm_") && !TRACKING_PARAMS.contains(&key.as_str())
            })
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    url.to_string()
}

/// Lowercase hex SHA-256 of the normalized URL.
pub fn url_hash(normalized_url: &str) -> String {
    hex::encode(Sha256::digest(normalized_url.as_bytes()))
}

/// Host without a leading `www.`; empty for URLs without a host.
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_default()
}

/// An application recognized from its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Application {
    pub name: &'static str,
    pub document_type: DocumentType,
}

static APPLICATIONS: Lazy<HashMap<&'static str, Application>> = Lazy::new(|| {
    use DocumentType::*;
    let table: &[(&'static str, &'static str, DocumentType)] = &[
        ("docs.google.com", "Google Docs", Document),
        ("sheets.google.com", "Google Sheets", Report),
        ("slides.google.com", "Google Slides", Document),
        ("mail.google.com", "Gmail", Email),
        ("outlook.office.com", "Outlook", Email),
        ("outlook.live.com", "Outlook", Email),
        ("calendar.google.com", "Google Calendar", MeetingNotes),
        ("meet.google.com", "Google Meet", MeetingNotes),
        ("zoom.us", "Zoom", MeetingNotes),
        ("teams.microsoft.com", "Microsoft Teams", MeetingNotes),
        ("notion.so", "Notion", Document),
        ("confluence.atlassian.com", "Confluence", Document),
        ("github.com", "GitHub", Code),
        ("gitlab.com", "GitLab", Code),
        ("bitbucket.org", "Bitbucket", Code),
        ("stackoverflow.com", "Stack Overflow", Code),
        ("figma.com", "Figma", Design),
        ("miro.com", "Miro", Design),
        ("canva.com", "Canva", Design),
        ("medium.com", "Medium", Article),
        ("substack.com", "Substack", Article),
        ("wikipedia.org", "Wikipedia", Article),
        ("en.wikipedia.org", "Wikipedia", Article),
        ("datastudio.google.com", "Looker Studio", Report),
        ("lookerstudio.google.com", "Looker Studio", Report),
    ];
    table
        .iter()
        .map(|(domain, name, document_type)| {
            (
                *domain,
                Application {
                    name: *name,
                    document_type: *document_type,
                },
            )
        })
        .collect()
});

/// Look up the application for a domain, falling back to its parent domains
/// (`acme.atlassian.net` does not match, `gist.github.com` matches GitHub).
pub fn detect_application(domain: &str) -> Option<Application> {
    let mut candidate = domain.trim_start_matches("www.");
    loop {
        if let Some(app) = APPLICATIONS.get(candidate) {
            return Some(*app);
        }
        match candidate.split_once('.') {
            Some((_, rest)) if rest.contains('.') => candidate = rest,
            _ => return None,
        }
    }
}
