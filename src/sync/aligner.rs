//! Transcript-to-text word aligner.
//!
//! The transcript comes from an independent recognizer and may drop, merge
//! or substitute words. Two cursors walk the transcript and the original
//! words; small insertions and deletions are skipped by looking a few
//! positions ahead on either side before falling back to a forced pairing.

use crate::defaults;
use crate::speech::service::TranscriptWord;
use crate::sync::timing::TimingEntry;
use crate::text::token::normalize_word;
use serde::{Deserialize, Serialize};

/// How an aligned word got its timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    /// Normalized transcript and original words matched.
    Matched,
    /// No match within the lookahead window; paired positionally.
    Forced,
}

/// Timing for one original word, taken from the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignedWord {
    pub word_index: usize,
    pub start: f64,
    pub end: f64,
    pub confidence: Confidence,
}

impl AlignedWord {
    pub fn entry(&self) -> TimingEntry {
        TimingEntry {
            word_index: self.word_index,
            start: self.start,
            end: self.end,
        }
    }
}

/// Aligns transcript timings onto the original words.
///
/// The result is sparse and ordered by `word_index`; indices are always in
/// `0..words.len()`, and each entry has `0 <= start <= end`. Transcript
/// entries with non-finite timestamps are ignored.
pub fn align<S: AsRef<str>>(words: &[S], transcript: &[TranscriptWord]) -> Vec<AlignedWord> {
    let original: Vec<String> = words.iter().map(|w| normalize_word(w.as_ref())).collect();
    let heard: Vec<String> = transcript
        .iter()
        .map(|t| {
            if t.start.is_finite() && t.end.is_finite() {
                normalize_word(&t.text)
            } else {
                String::new()
            }
        })
        .collect();

    let mut aligned = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);

    while i < heard.len() && j < original.len() {
        if heard[i].is_empty() {
            i += 1;
            continue;
        }
        if original[j].is_empty() {
            j += 1;
            continue;
        }

        if heard[i] == original[j] {
            aligned.push(timed(j, &transcript[i], Confidence::Matched));
            i += 1;
            j += 1;
            continue;
        }

        // Extra words in the transcript: skip them.
        if let Some(skip) = lookahead(&heard, i, &original[j]) {
            i += skip;
            continue;
        }

        // Words the recognizer dropped: leave them untimed.
        if let Some(skip) = lookahead(&original, j, &heard[i]) {
            j += skip;
            continue;
        }

        aligned.push(timed(j, &transcript[i], Confidence::Forced));
        i += 1;
        j += 1;
    }

    aligned
}

/// Distance (1..=ALIGN_LOOKAHEAD) to the next occurrence of `target` after `from`.
fn lookahead(seq: &[String], from: usize, target: &str) -> Option<usize> {
    (1..=defaults::ALIGN_LOOKAHEAD)
        .take_while(|k| from + k < seq.len())
        .find(|k| seq[from + k] == target)
}

fn timed(word_index: usize, heard: &TranscriptWord, confidence: Confidence) -> AlignedWord {
    let start = heard.start.max(0.0);
    AlignedWord {
        word_index,
        start,
        end: heard.end.max(start),
        confidence,
    }
}
