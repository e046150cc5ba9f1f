//! Error types for readalong.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadalongError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Speech service errors
    #[error("Synthesis failed for chunk {chunk}: {message}")]
    ChunkSynthesis { chunk: usize, message: String },

    #[error("Transcription error: {message}")]
    Transcription { message: String },

    // Playback errors
    #[error("Playback blocked until user gesture: {message}")]
    PlaybackBlocked { message: String },

    #[error("Audio resource error: {message}")]
    AudioResource { message: String },

    // Document errors
    #[error("Unknown region: {region}")]
    UnknownRegion { region: u64 },

    // Session errors
    #[error("Session controller is no longer running")]
    SessionClosed,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl ReadalongError {
    /// Returns true when the error is a playback refusal that a user gesture can lift.
    pub fn is_playback_blocked(&self) -> bool {
        matches!(self, ReadalongError::PlaybackBlocked { .. })
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ReadalongError>;
