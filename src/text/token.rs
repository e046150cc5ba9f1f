//! Word-level text helpers shared by the chunker, aligner and element index.

/// Apostrophe variants folded to `'` before comparison.
const APOSTROPHES: [char; 6] = ['\u{2019}', '\u{2018}', '\u{02BC}', '\u{2032}', '`', '\u{00B4}'];

/// Closing characters allowed after sentence-terminal punctuation.
const CLOSERS: [char; 10] = ['"', '\'', '\u{201D}', '\u{2019}', '\u{00BB}', ')', ']', '}', '*', '_'];

/// Normalizes a word for alignment comparison.
///
/// Lowercases, folds apostrophe variants to `'`, and strips leading and
/// trailing characters that are not letters, digits or apostrophes. Interior
/// punctuation ("e.g", "well-known") is kept.
pub fn normalize_word(word: &str) -> String {
    let folded: String = word
        .chars()
        .map(|c| if APOSTROPHES.contains(&c) { '\'' } else { c })
        .flat_map(char::to_lowercase)
        .collect();

    folded
        .trim_matches(|c: char| !(c.is_alphanumeric() || c == '\''))
        .to_string()
}

/// Returns true when the token ends a sentence.
///
/// Accepts `.`, `!`, `?` and `…`, optionally followed by closing quotes or
/// brackets (`"Stop!"`, `(done.)`).
pub fn is_sentence_end(token: &str) -> bool {
    token
        .trim_end_matches(|c: char| CLOSERS.contains(&c))
        .ends_with(['.', '!', '?', '\u{2026}'])
}

/// Byte spans of whitespace-separated words in `text`.
pub fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, idx));
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }

    spans
}
