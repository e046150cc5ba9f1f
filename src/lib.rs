//! readalong - word-level read-along synchronization
//!
//! Chunks text for speech synthesis, aligns transcripts back onto the
//! source words, and drives a highlight in step with the audio while the
//! reader plays linearly or roams word by word across regions.

// Library code propagates errors instead of panicking
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod document;
pub mod error;
pub mod playback;
pub mod session;
pub mod speech;
pub mod sync;
pub mod text;

// Ports the host implements
pub use document::region::RegionProvider;
pub use playback::audio::{AudioBackend, AudioPlayer};
pub use playback::highlight::HighlightSink;
pub use speech::service::SpeechService;

// Session
pub use session::{Activation, SessionController, SessionEvent, SessionHandle, StepOutcome};

// Error handling
pub use error::{ReadalongError, Result};

// Config
pub use config::{Config, ReadingMode, Settings};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_has_short_hash_when_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(hash_part.len(), 7, "Git hash should be 7 chars, got: {}", ver);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
