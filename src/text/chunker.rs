//! Sentence-aware text chunker.
//!
//! Splits a word sequence into chunks of at most `max_chars` characters,
//! joined by single spaces. When the budget runs out mid-sentence the chunk
//! may grow up to `max_chars * 1.5` to reach the nearest sentence end;
//! otherwise it is cut hard at the limit. A chunk never splits a word.

use crate::defaults;
use crate::text::token::is_sentence_end;
use serde::{Deserialize, Serialize};

/// A run of consecutive words sent to synthesis as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Words joined by single spaces.
    pub text: String,
    /// Number of source words this chunk consumes.
    pub word_count: usize,
}

/// Splits `tokens` into sentence-aware chunks.
///
/// The word counts of the returned chunks always sum to `tokens.len()`.
pub fn chunk<S: AsRef<str>>(tokens: &[S], max_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(1);
    let tolerance = (max_chars as f64 * defaults::SENTENCE_LOOKAHEAD_FACTOR).floor() as usize;

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;
    let mut i = 0usize;

    while i < tokens.len() {
        let token = tokens[i].as_ref();
        let token_len = token.chars().count();
        let joined_len = if current.is_empty() {
            token_len
        } else {
            current_len + 1 + token_len
        };

        if current.is_empty() || joined_len <= max_chars {
            current.push(token);
            current_len = joined_len;
            i += 1;
            continue;
        }

        // Budget exhausted. An oversized lone token or an accumulator that
        // already ends a sentence is flushed as-is.
        let ends_sentence = current.last().is_some_and(|last| is_sentence_end(last));
        if current_len <= max_chars
            && !ends_sentence
            && let Some(end) = find_sentence_end(tokens, i, current_len, max_chars, tolerance)
        {
            current.extend(tokens[i..=end].iter().map(|token| token.as_ref()));
            i = end + 1;
        }

        chunks.push(flush(&mut current));
        current_len = 0;
    }

    if !current.is_empty() {
        chunks.push(flush(&mut current));
    }

    chunks
}

/// Finds the nearest sentence-ending token at or after `from` whose
/// inclusion keeps the chunk within `tolerance` characters.
fn find_sentence_end<S: AsRef<str>>(
    tokens: &[S],
    from: usize,
    mut len: usize,
    max_chars: usize,
    tolerance: usize,
) -> Option<usize> {
    for (offset, token) in tokens[from..].iter().enumerate() {
        let token = token.as_ref();
        let token_len = token.chars().count();
        // A token that cannot fit a chunk on its own never rides along.
        if token_len > max_chars {
            return None;
        }
        len += 1 + token_len;
        if len > tolerance {
            return None;
        }
        if is_sentence_end(token) {
            return Some(from + offset);
        }
    }
    None
}

fn flush(current: &mut Vec<&str>) -> Chunk {
    let chunk = Chunk {
        text: current.join(" "),
        word_count: current.len(),
    };
    current.clear();
    chunk
}
