//! Page text cleanup before summarization.

use once_cell::sync::Lazy;
use regex::Regex;

use tabweave_core::defaults;

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Collapse all whitespace (including newlines) to single spaces, then
/// collapse any word repeated three or more times in a row to one
/// occurrence. Repetition is compared case-insensitively.
pub fn clean_text(raw: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
    let words: Vec<&str> = collapsed.split(' ').filter(|w| !w.is_empty()).collect();

    let mut out: Vec<&str> = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let folded = words[i].to_lowercase();
        let mut run = 1;
        while i + run < words.len() && words[i + run].to_lowercase() == folded {
            run += 1;
        }
        let keep = if run >= defaults::REPEATED_WORD_RUN { 1 } else { run };
        out.extend(std::iter::repeat(words[i]).take(keep));
        i += run;
    }
    out.join(" ")
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Whole minutes to read `words`, rounded up.
pub fn reading_time_minutes(words: usize) -> u32 {
    words.div_ceil(defaults::READING_WORDS_PER_MINUTE) as u32
}
