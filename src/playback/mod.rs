//! Audio playback and word highlighting.

pub mod audio;
pub mod highlight;
pub mod scheduler;

pub use audio::{AudioBackend, AudioPlayer, SimulatedAudioBackend};
pub use highlight::{CollectorHighlightSink, HighlightEvent, HighlightSink};
pub use scheduler::{PlaybackScheduler, PlaybackState, TickOutcome};
