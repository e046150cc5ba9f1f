//! Playback scheduler for one chunk.
//!
//! Owns the chunk's audio player and timing table. The session loop calls
//! [`PlaybackScheduler::tick`] on a fixed interval; each tick reads the audio
//! clock, finds the active word by binary search and forwards it to the
//! highlight sink when it changed.

use crate::document::region::Word;
use crate::error::Result;
use crate::playback::audio::AudioPlayer;
use crate::playback::highlight::HighlightSink;
use crate::speech::service::TranscriptWord;
use crate::sync::aligner::{AlignedWord, align};
use crate::sync::timing::{TimingEntry, normalize, start_time_of, word_index_at};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Created, not started yet.
    Ready,
    Playing,
    Paused,
    /// The environment refused to start audio; waiting for `resume`.
    Blocked,
    Ended,
    Released,
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing; nothing was read.
    Idle,
    /// The active word is unchanged since the last highlight.
    Unchanged,
    /// A new word was highlighted.
    Highlighted(usize),
    /// Audio reached its end on this tick.
    Ended,
}

pub struct PlaybackScheduler {
    player: Box<dyn AudioPlayer>,
    words: Vec<Word>,
    sparse: Vec<AlignedWord>,
    table: Vec<TimingEntry>,
    duration: Option<f64>,
    active: Option<usize>,
    state: PlaybackState,
}

impl PlaybackScheduler {
    /// Aligns `transcript` against `words` and builds the initial table.
    ///
    /// If the player does not know its duration yet the table is estimated
    /// and corrected on the first tick that sees a duration.
    pub fn new(player: Box<dyn AudioPlayer>, words: Vec<Word>, transcript: &[TranscriptWord]) -> Self {
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        let sparse = align(&texts, transcript);
        let duration = player.duration();
        let table = normalize(words.len(), &sparse, duration);

        tracing::debug!(
            words = words.len(),
            aligned = sparse.len(),
            duration = ?duration,
            "built timing table"
        );

        Self {
            player,
            words,
            sparse,
            table,
            duration,
            active: None,
            state: PlaybackState::Ready,
        }
    }

    /// Seeks to `at_word` and starts playback.
    ///
    /// On `PlaybackBlocked` the scheduler stays usable; call
    /// [`resume`](Self::resume) from a user-gesture handler.
    pub fn start(&mut self, at_word: usize) -> Result<()> {
        if self.state == PlaybackState::Released {
            return Ok(());
        }
        self.player.seek(start_time_of(&self.table, at_word));
        self.play()
    }

    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Paused | PlaybackState::Blocked | PlaybackState::Ready => self.play(),
            _ => Ok(()),
        }
    }

    fn play(&mut self) -> Result<()> {
        match self.player.play() {
            Ok(()) => {
                self.state = PlaybackState::Playing;
                Ok(())
            }
            Err(e) => {
                if e.is_playback_blocked() {
                    tracing::warn!(error = %e, "playback blocked");
                    self.state = PlaybackState::Blocked;
                }
                Err(e)
            }
        }
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.player.pause();
            self.state = PlaybackState::Paused;
        }
    }

    /// Advances highlighting to the audio clock.
    pub fn tick(&mut self, sink: &mut dyn HighlightSink) -> TickOutcome {
        if self.state != PlaybackState::Playing {
            return TickOutcome::Idle;
        }

        if self.duration.is_none()
            && let Some(duration) = self.player.duration()
        {
            self.set_audio_duration(duration);
        }

        if self.player.is_ended() {
            self.state = PlaybackState::Ended;
            return TickOutcome::Ended;
        }

        let index = word_index_at(&self.table, self.player.position());
        if self.active == Some(index) {
            return TickOutcome::Unchanged;
        }
        match self.words.get(index) {
            Some(word) => {
                sink.highlight(word);
                self.active = Some(index);
                TickOutcome::Highlighted(index)
            }
            None => TickOutcome::Unchanged,
        }
    }

    /// Moves playback to `word_index` and highlights it right away,
    /// whether or not audio is playing.
    pub fn seek_to_word(&mut self, word_index: usize, sink: &mut dyn HighlightSink) {
        if self.state == PlaybackState::Released {
            return;
        }
        let Some(word) = self.words.get(word_index) else {
            return;
        };
        self.player.seek(start_time_of(&self.table, word_index));
        sink.highlight(word);
        self.active = Some(word_index);
        if self.state == PlaybackState::Ended {
            self.state = PlaybackState::Paused;
        }
    }

    /// Rebuilds the table against the real audio duration.
    pub fn set_audio_duration(&mut self, duration: f64) {
        if !(duration.is_finite() && duration > 0.0) {
            return;
        }
        tracing::debug!(duration, "audio duration known, renormalizing");
        self.duration = Some(duration);
        self.table = normalize(self.words.len(), &self.sparse, Some(duration));
    }

    /// Stops audio and frees the player.
    pub fn release(&mut self) {
        self.player.release();
        self.state = PlaybackState::Released;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn active_word(&self) -> Option<usize> {
        self.active
    }

    pub fn table(&self) -> &[TimingEntry] {
        &self.table
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn position(&self) -> f64 {
        self.player.position()
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        if self.state != PlaybackState::Released {
            self.player.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::region::ContainerRef;
    use crate::error::ReadalongError;
    use crate::playback::highlight::CollectorHighlightSink;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct ManualState {
        position: f64,
        duration: Option<f64>,
        playing: bool,
        blocked: bool,
        released: bool,
        seeks: Vec<f64>,
    }

    /// Player whose clock the test moves by hand.
    #[derive(Clone, Default)]
    struct ManualPlayer(Arc<Mutex<ManualState>>);

    impl ManualPlayer {
        fn with_duration(duration: Option<f64>) -> Self {
            let player = Self::default();
            player.0.lock().unwrap().duration = duration;
            player
        }

        fn set_position(&self, position: f64) {
            self.0.lock().unwrap().position = position;
        }

        fn set_duration(&self, duration: f64) {
            self.0.lock().unwrap().duration = Some(duration);
        }

        fn block(&self, blocked: bool) {
            self.0.lock().unwrap().blocked = blocked;
        }
    }

    impl AudioPlayer for ManualPlayer {
        fn play(&mut self) -> Result<()> {
            let mut state = self.0.lock().unwrap();
            if state.blocked {
                return Err(ReadalongError::PlaybackBlocked {
                    message: "gesture".to_string(),
                });
            }
            state.playing = true;
            Ok(())
        }

        fn pause(&mut self) {
            self.0.lock().unwrap().playing = false;
        }

        fn seek(&mut self, position: f64) {
            let mut state = self.0.lock().unwrap();
            state.position = position;
            state.seeks.push(position);
        }

        fn position(&self) -> f64 {
            self.0.lock().unwrap().position
        }

        fn duration(&self) -> Option<f64> {
            self.0.lock().unwrap().duration
        }

        fn is_playing(&self) -> bool {
            self.0.lock().unwrap().playing
        }

        fn is_ended(&self) -> bool {
            let state = self.0.lock().unwrap();
            state.duration.is_some_and(|d| state.position >= d)
        }

        fn release(&mut self) {
            let mut state = self.0.lock().unwrap();
            state.released = true;
            state.playing = false;
        }
    }

    fn words(texts: &[&str]) -> Vec<Word> {
        let mut offset = 0;
        texts
            .iter()
            .map(|text| {
                let word = Word {
                    container: ContainerRef(1),
                    start_offset: offset,
                    end_offset: offset + text.len(),
                    text: text.to_string(),
                };
                offset += text.len() + 1;
                word
            })
            .collect()
    }

    fn exact(texts: &[&str], secs: f64) -> Vec<TranscriptWord> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| TranscriptWord::new(t, i as f64 * secs, (i + 1) as f64 * secs))
            .collect()
    }

    const TEXTS: [&str; 4] = ["one", "two", "three", "four"];

    fn scheduler(duration: Option<f64>) -> (PlaybackScheduler, ManualPlayer) {
        let player = ManualPlayer::with_duration(duration);
        let scheduler = PlaybackScheduler::new(
            Box::new(player.clone()),
            words(&TEXTS),
            &exact(&TEXTS, 0.5),
        );
        (scheduler, player)
    }

    #[test]
    fn test_highlights_once_per_word() {
        let (mut scheduler, player) = scheduler(Some(2.0));
        let mut sink = CollectorHighlightSink::new();
        scheduler.start(0).unwrap();

        for step in 0..40 {
            player.set_position(step as f64 * 0.05);
            scheduler.tick(&mut sink);
        }

        assert_eq!(sink.words(), vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn test_tick_outcomes() {
        let (mut scheduler, player) = scheduler(Some(2.0));
        let mut sink = CollectorHighlightSink::new();
        assert_eq!(scheduler.tick(&mut sink), TickOutcome::Idle);

        scheduler.start(0).unwrap();
        assert_eq!(scheduler.tick(&mut sink), TickOutcome::Highlighted(0));
        assert_eq!(scheduler.tick(&mut sink), TickOutcome::Unchanged);
        player.set_position(1.1);
        assert_eq!(scheduler.tick(&mut sink), TickOutcome::Highlighted(2));
        player.set_position(2.0);
        assert_eq!(scheduler.tick(&mut sink), TickOutcome::Ended);
        assert_eq!(scheduler.state(), PlaybackState::Ended);
    }

    #[test]
    fn test_start_mid_chunk_seeks() {
        let (mut scheduler, player) = scheduler(Some(2.0));
        scheduler.start(2).unwrap();
        assert_eq!(player.0.lock().unwrap().seeks, vec![1.0]);

        let mut sink = CollectorHighlightSink::new();
        assert_eq!(scheduler.tick(&mut sink), TickOutcome::Highlighted(2));
    }

    #[test]
    fn test_no_highlight_while_paused() {
        let (mut scheduler, player) = scheduler(Some(2.0));
        let mut sink = CollectorHighlightSink::new();
        scheduler.start(0).unwrap();
        scheduler.tick(&mut sink);
        scheduler.pause();

        player.set_position(1.6);
        assert_eq!(scheduler.tick(&mut sink), TickOutcome::Idle);
        assert_eq!(sink.words(), vec!["one"]);

        scheduler.resume().unwrap();
        assert_eq!(scheduler.tick(&mut sink), TickOutcome::Highlighted(3));
    }

    #[test]
    fn test_seek_highlights_immediately_while_paused() {
        let (mut scheduler, player) = scheduler(Some(2.0));
        let mut sink = CollectorHighlightSink::new();
        scheduler.start(0).unwrap();
        scheduler.pause();

        scheduler.seek_to_word(3, &mut sink);
        assert_eq!(sink.words(), vec!["four"]);
        assert_eq!(scheduler.active_word(), Some(3));
        assert!((player.position() - 1.5).abs() < 1e-9);

        // Out of range is ignored.
        scheduler.seek_to_word(10, &mut sink);
        assert_eq!(scheduler.active_word(), Some(3));
    }

    #[test]
    fn test_blocked_then_resume() {
        let (mut scheduler, player) = scheduler(Some(2.0));
        player.block(true);

        let err = scheduler.start(1).unwrap_err();
        assert!(err.is_playback_blocked());
        assert_eq!(scheduler.state(), PlaybackState::Blocked);

        player.block(false);
        scheduler.resume().unwrap();
        assert_eq!(scheduler.state(), PlaybackState::Playing);
        // The seek from `start` survives the retry.
        assert!((player.position() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_late_duration_renormalizes() {
        let player = ManualPlayer::with_duration(None);
        let mut scheduler = PlaybackScheduler::new(Box::new(player.clone()), words(&TEXTS), &[]);
        let estimated = scheduler.table().last().map(|e| e.end).unwrap();
        assert!((estimated - 4.0 * 0.35).abs() < 1e-9);

        let mut sink = CollectorHighlightSink::new();
        scheduler.start(0).unwrap();
        player.set_duration(4.0);
        player.set_position(1.2);
        assert_eq!(scheduler.tick(&mut sink), TickOutcome::Highlighted(1));
        assert!((scheduler.table()[3].end - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_release_frees_player() {
        let (mut scheduler, player) = scheduler(Some(2.0));
        scheduler.start(0).unwrap();
        scheduler.release();

        assert!(player.0.lock().unwrap().released);
        assert_eq!(scheduler.state(), PlaybackState::Released);
        let mut sink = CollectorHighlightSink::new();
        assert_eq!(scheduler.tick(&mut sink), TickOutcome::Idle);
    }

    #[test]
    fn test_drop_releases_player() {
        let (scheduler, player) = scheduler(Some(2.0));
        drop(scheduler);
        assert!(player.0.lock().unwrap().released);
    }
}
