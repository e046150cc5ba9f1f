//! Audio resource port.
//!
//! The host owns decoding and output; the scheduler only needs a clock that
//! can be started, paused, sought and released.

use crate::error::{ReadalongError, Result};
use crate::speech::service::SynthesizedAudio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// One decoded audio resource.
pub trait AudioPlayer: Send {
    /// Start or continue playback. May fail with `PlaybackBlocked` when the
    /// environment wants a user gesture first.
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Move the playhead to `position` seconds.
    fn seek(&mut self, position: f64);

    /// Playhead in seconds.
    fn position(&self) -> f64;

    /// Total duration, once the resource knows it.
    fn duration(&self) -> Option<f64>;

    fn is_playing(&self) -> bool;

    fn is_ended(&self) -> bool;

    /// Stop playback and free the decoded buffer. Idempotent.
    fn release(&mut self);
}

/// Opens players for synthesized audio.
pub trait AudioBackend: Send + Sync {
    fn open(&self, audio: &SynthesizedAudio) -> Result<Box<dyn AudioPlayer>>;
}

impl<T: AudioBackend + ?Sized> AudioBackend for Arc<T> {
    fn open(&self, audio: &SynthesizedAudio) -> Result<Box<dyn AudioPlayer>> {
        (**self).open(audio)
    }
}

/// Backend whose players advance with the tokio clock.
///
/// Duration is `bytes / bytes_per_sec`. Under a paused tokio runtime the
/// playhead moves exactly as far as the test advances time.
#[derive(Debug, Clone)]
pub struct SimulatedAudioBackend {
    bytes_per_sec: usize,
    late_duration: Option<Duration>,
    gesture_required: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
}

impl SimulatedAudioBackend {
    pub fn new(bytes_per_sec: usize) -> Self {
        Self {
            bytes_per_sec: bytes_per_sec.max(1),
            late_duration: None,
            gesture_required: Arc::new(AtomicBool::new(false)),
            live: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Players report no duration until `after` has elapsed since opening.
    pub fn with_late_duration(mut self, after: Duration) -> Self {
        self.late_duration = Some(after);
        self
    }

    /// Refuse to play until [`grant_gesture`](Self::grant_gesture) is called.
    pub fn require_gesture(&self) {
        self.gesture_required.store(true, Ordering::SeqCst);
    }

    pub fn grant_gesture(&self) {
        self.gesture_required.store(false, Ordering::SeqCst);
    }

    /// Players opened and not yet released.
    pub fn live_players(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Players opened since creation.
    pub fn opened_players(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl AudioBackend for SimulatedAudioBackend {
    fn open(&self, audio: &SynthesizedAudio) -> Result<Box<dyn AudioPlayer>> {
        if audio.bytes.is_empty() {
            return Err(ReadalongError::AudioResource {
                message: "empty audio buffer".to_string(),
            });
        }
        self.live.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedPlayer {
            duration: audio.bytes.len() as f64 / self.bytes_per_sec as f64,
            opened_at: Instant::now(),
            late_duration: self.late_duration,
            offset: 0.0,
            started: None,
            released: false,
            gesture_required: Arc::clone(&self.gesture_required),
            live: Arc::clone(&self.live),
        }))
    }
}

struct SimulatedPlayer {
    duration: f64,
    opened_at: Instant,
    late_duration: Option<Duration>,
    /// Playhead at the moment `started` was taken (or while paused).
    offset: f64,
    started: Option<Instant>,
    released: bool,
    gesture_required: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
}

impl AudioPlayer for SimulatedPlayer {
    fn play(&mut self) -> Result<()> {
        if self.released {
            return Err(ReadalongError::AudioResource {
                message: "player already released".to_string(),
            });
        }
        if self.gesture_required.load(Ordering::SeqCst) {
            return Err(ReadalongError::PlaybackBlocked {
                message: "autoplay refused without user gesture".to_string(),
            });
        }
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.offset = self.position();
        self.started = None;
    }

    fn seek(&mut self, position: f64) {
        self.offset = position.clamp(0.0, self.duration);
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }

    fn position(&self) -> f64 {
        let elapsed = self
            .started
            .map_or(0.0, |started| started.elapsed().as_secs_f64());
        (self.offset + elapsed).min(self.duration)
    }

    fn duration(&self) -> Option<f64> {
        match self.late_duration {
            Some(after) if self.opened_at.elapsed() < after => None,
            _ => Some(self.duration),
        }
    }

    fn is_playing(&self) -> bool {
        self.started.is_some() && !self.is_ended()
    }

    fn is_ended(&self) -> bool {
        self.position() >= self.duration
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.started = None;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SimulatedPlayer {
    fn drop(&mut self) {
        self.release();
    }
}
