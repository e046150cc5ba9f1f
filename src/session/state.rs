//! Session state, one variant per mode.
//!
//! Everything a mode needs is owned by its variant. The parts that survive a
//! mode change (element index, reading flow, cursor, audio) live in
//! [`SessionCore`] and move from one variant to the next.

use crate::config::Settings;
use crate::document::flow::{ReadingFlow, next_nonempty_region};
use crate::document::index::{ElementIndex, ElementState};
use crate::document::region::{Direction, RegionId, RegionProvider};
use crate::playback::scheduler::PlaybackScheduler;
use crate::speech::service::{ChunkPayload, SynthesisRequest};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Spawned requests owned by a session; aborted when dropped.
#[derive(Debug, Default)]
pub(crate) struct TaskSet {
    handles: Vec<JoinHandle<()>>,
}

impl TaskSet {
    pub(crate) fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.retain(|h| !h.is_finished());
        self.handles.push(handle);
    }

    pub(crate) fn abort_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        self.abort_all();
    }
}

/// Audio currently owned by the session and the chunk it belongs to.
pub(crate) struct ActivePlayback {
    pub chunk: usize,
    pub scheduler: PlaybackScheduler,
}

pub(crate) struct SessionCore {
    pub id: u64,
    pub region: RegionId,
    /// Cursor: word index within `region`.
    pub word: usize,
    pub index: ElementIndex,
    pub flow: Option<ReadingFlow>,
    pub playback: Option<ActivePlayback>,
    pub user_paused: bool,
}

impl SessionCore {
    pub fn new(id: u64, region: RegionId, word: usize, index: ElementIndex) -> Self {
        Self {
            id,
            region,
            word,
            index,
            flow: None,
            playback: None,
            user_paused: false,
        }
    }

    pub fn element(&self) -> Option<&ElementState> {
        self.index.state(self.region)
    }

    /// Synthesis request for one chunk of the current region.
    pub fn request_for(&self, chunk: usize, settings: &Settings) -> Option<SynthesisRequest> {
        let text = self.element()?.chunk(chunk)?.text.clone();
        Some(SynthesisRequest {
            text,
            model: settings.model.clone(),
            voice: settings.voice.clone(),
        })
    }

    /// Where a step in `direction` would land, without moving.
    ///
    /// `None` is a dead end.
    pub fn step_target(
        &mut self,
        provider: &dyn RegionProvider,
        direction: Direction,
        max_chars: usize,
    ) -> crate::error::Result<Option<(RegionId, usize)>> {
        let count = self
            .index
            .ensure_state(provider, self.region, max_chars)?
            .word_count();

        if count > 0 {
            let within = self.word.min(count - 1);
            if let Some(next) = direction.step(within, count) {
                return Ok(Some((self.region, next)));
            }
        }

        let Some(region) = next_nonempty_region(
            provider,
            &mut self.flow,
            &mut self.index,
            self.region,
            direction,
            max_chars,
        ) else {
            return Ok(None);
        };

        let count = self
            .index
            .state(region)
            .map_or(0, ElementState::word_count);
        let word = match direction {
            Direction::Forward => 0,
            Direction::Backward => count.saturating_sub(1),
        };
        Ok(Some((region, word)))
    }

    /// Stops and frees the current audio resource, if any.
    pub fn release_playback(&mut self) {
        if let Some(mut active) = self.playback.take() {
            active.scheduler.release();
        }
    }
}

/// A sequential chunk-by-chunk read of one region.
pub(crate) struct LinearSession {
    pub core: SessionCore,
    pub first_chunk: usize,
    /// Word offset inside `first_chunk` to start at.
    pub start_offset: usize,
    pub chunk_count: usize,
    /// Next chunk to hand to the scheduler.
    pub next_to_play: usize,
    /// Next chunk to request from the speech service.
    pub next_to_request: usize,
    /// Chunks that arrived before their turn.
    pub ready: BTreeMap<usize, Arc<ChunkPayload>>,
    pub requests: TaskSet,
}

impl LinearSession {
    pub fn new(core: SessionCore, first_chunk: usize, start_offset: usize, chunk_count: usize) -> Self {
        Self {
            core,
            first_chunk,
            start_offset,
            chunk_count,
            next_to_play: first_chunk,
            next_to_request: first_chunk,
            ready: BTreeMap::new(),
            requests: TaskSet::default(),
        }
    }

    /// Chunks that may be requested now, bounded by the prefetch window.
    pub fn requestable(&self, prefetch: usize) -> std::ops::Range<usize> {
        let limit = (self.next_to_play + prefetch.max(1)).min(self.chunk_count);
        self.next_to_request..limit.max(self.next_to_request)
    }

    pub fn is_complete(&self) -> bool {
        self.next_to_play >= self.chunk_count && self.core.playback.is_none()
    }
}

/// A pending roam chunk request.
pub(crate) struct PendingRoam {
    pub token: u64,
    pub chunk: usize,
    /// Aborted when the pending entry is dropped.
    pub _task: TaskSet,
}

/// Word-by-word navigation, possibly across regions.
pub(crate) struct RoamSession {
    pub core: SessionCore,
    pub pending: Option<PendingRoam>,
}

impl RoamSession {
    pub fn new(core: SessionCore) -> Self {
        Self {
            core,
            pending: None,
        }
    }
}

pub(crate) enum SessionState {
    /// No active session. `retained` keeps the last highlight alive after a
    /// linear read finished, until the next activation or stop.
    Idle { retained: Option<SessionCore> },
    LinearPlaying(LinearSession),
    Roaming(RoamSession),
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle { retained: None }
    }
}

impl SessionState {
    pub fn core_mut(&mut self) -> Option<&mut SessionCore> {
        match self {
            SessionState::Idle { retained } => retained.as_mut(),
            SessionState::LinearPlaying(linear) => Some(&mut linear.core),
            SessionState::Roaming(roam) => Some(&mut roam.core),
        }
    }

    /// Takes the core out, leaving `Idle` behind. Pending requests of the
    /// previous mode are aborted as its variant drops.
    pub fn into_core(self) -> Option<SessionCore> {
        match self {
            SessionState::Idle { retained } => retained,
            SessionState::LinearPlaying(linear) => Some(linear.core),
            SessionState::Roaming(roam) => Some(roam.core),
        }
    }
}
