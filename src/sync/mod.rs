//! Word timing: transcript alignment and the normalized per-word table.

pub mod aligner;
pub mod timing;

pub use aligner::{AlignedWord, Confidence, align};
pub use timing::{TimingEntry, normalize, start_time_of, table_end, word_index_at};
