//! Text preparation for synthesis: word helpers and the sentence-aware chunker.

pub mod chunker;
pub mod token;

pub use chunker::{Chunk, chunk};
pub use token::{is_sentence_end, normalize_word, word_spans};
