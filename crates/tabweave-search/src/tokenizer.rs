//! Tokenization shared by indexing and querying.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use tabweave_core::defaults;

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '\''
}

/// Split `text` into index tokens.
///
/// Diacritics are stripped (NFD, combining marks dropped), text is
/// lowercased, characters other than word characters, hyphens, apostrophes
/// and whitespace are removed, the rest is split on whitespace, and each
/// token is trimmed of leading and trailing hyphens and apostrophes. Tokens
/// of two characters or fewer and purely numeric tokens are discarded.
///
/// Punctuation therefore joins rather than splits: `docs.rs` indexes as
/// `docsrs`.
pub fn tokenize(text: &str) -> Vec<String> {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| is_token_char(*c) || c.is_whitespace())
        .collect();

    folded
        .split_whitespace()
        .map(|raw| raw.trim_matches(|c| c == '-' || c == '\''))
        .filter(|token| token.chars().count() >= defaults::TOKEN_MIN_LEN)
        .filter(|token| !token.chars().all(|c| c.is_numeric()))
        .map(str::to_string)
        .collect()
}

/// Bigrams and trigrams (up to `max_n`) of `tokens`, joined by the n-gram
/// separator.
pub fn ngrams(tokens: &[String], max_n: usize) -> Vec<String> {
    let separator = defaults::NGRAM_SEPARATOR.to_string();
    (2..=max_n)
        .flat_map(|n| tokens.windows(n).map(|w| w.join(&separator)))
        .collect()
}

/// Whether `term` is a generated n-gram rather than a single token.
pub fn is_ngram(term: &str) -> bool {
    term.contains(defaults::NGRAM_SEPARATOR)
}
