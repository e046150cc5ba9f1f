//! Default configuration constants for readalong.
//!
//! Shared by the config layer and the synchronization algorithms so the two
//! never drift apart.

/// Default maximum characters per synthesis chunk.
pub const MAX_CHARS: usize = 300;

/// Smallest accepted `max_chars` setting.
pub const MIN_MAX_CHARS: usize = 50;

/// Largest accepted `max_chars` setting.
pub const MAX_MAX_CHARS: usize = 1000;

/// How far past `max_chars` the chunker may extend to reach a sentence end.
///
/// 1.5 lets a chunk grow by half its budget rather than cut a sentence.
pub const SENTENCE_LOOKAHEAD_FACTOR: f64 = 1.5;

/// Positions the aligner scans ahead on either side before force-pairing.
pub const ALIGN_LOOKAHEAD: usize = 3;

/// Per-word duration in seconds when nothing better is known.
pub const DEFAULT_WORD_SECS: f64 = 0.35;

/// Minimum word duration as a fraction of the average word duration.
pub const MIN_WORD_FRACTION: f64 = 0.4;

/// Absolute floor for a single word's duration in seconds.
pub const MIN_WORD_SECS: f64 = 0.05;

/// Quiet period after the last directional step before a chunk is requested.
pub const ROAM_DEBOUNCE_MS: u64 = 300;

/// Highlight polling interval, roughly one display frame.
pub const TICK_MS: u64 = 16;

/// Chunks a linear read may have in flight or buffered ahead of the playing one.
pub const LINEAR_PREFETCH: usize = 3;

/// Upper bound on empty regions skipped by a single directional step.
pub const MAX_REGION_HOPS: usize = 64;

/// Default synthesis model identifier.
pub const DEFAULT_MODEL: &str = "tts-1";

/// Default synthesis voice.
pub const DEFAULT_VOICE: &str = "alloy";
