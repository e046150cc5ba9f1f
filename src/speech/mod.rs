//! Speech service boundary: synthesis, transcription and the chunk cache.

pub mod cache;
pub mod service;

pub use cache::ChunkCache;
pub use service::{
    ChunkPayload, MockSpeechService, MockTranscript, SpeechService, SynthesisRequest,
    SynthesizedAudio, TranscriptWord, synthesize_chunk,
};
