//! Session controller: the navigation state machine as a single-owner actor.
//!
//! One tokio task owns the session state, the audio resource and the
//! highlight sink. Host commands, completed speech requests, debounce
//! expiries and highlight ticks are all serialized through its `select!`
//! loop, so no state is shared across tasks. Spawned work reports back with
//! the session id or debounce token it was started under; anything that no
//! longer matches is dropped.

use crate::config::{ReadingMode, Settings};
use crate::document::index::{ElementIndex, ElementState};
use crate::document::region::{Direction, RegionProvider};
use crate::error::{ReadalongError, Result};
use crate::playback::audio::AudioBackend;
use crate::playback::highlight::HighlightSink;
use crate::playback::scheduler::{PlaybackScheduler, PlaybackState, TickOutcome};
use crate::session::debounce::Debouncer;
use crate::session::state::{
    ActivePlayback, LinearSession, PendingRoam, RoamSession, SessionCore, SessionState, TaskSet,
};
use crate::session::types::{
    Activation, ActivationTarget, Command, Internal, SessionEvent, SessionStatus, StepOutcome,
    Trigger,
};
use crate::speech::service::{ChunkPayload, SpeechService, synthesize_chunk};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;
const MIN_TICK: Duration = Duration::from_millis(1);

/// Host-side handle to a running [`SessionController`].
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
    events: Option<mpsc::Receiver<SessionEvent>>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| ReadalongError::SessionClosed)?;
        rx.await.map_err(|_| ReadalongError::SessionClosed)
    }

    /// Starts a new session, replacing any current one.
    pub async fn activate(&self, activation: Activation) -> Result<()> {
        self.request(|tx| Command::Activate(activation, tx)).await?
    }

    /// Moves the roam cursor one word. Enters roaming from any active mode.
    pub async fn step(&self, direction: Direction) -> Result<StepOutcome> {
        self.request(|tx| Command::Step(direction, tx)).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    /// Retries audio refused for lack of a user gesture, or resumes a pause.
    /// Call it from inside the host's gesture handler.
    pub async fn resume(&self) -> Result<()> {
        self.request(Command::Resume).await?
    }

    pub async fn toggle_pause(&self) -> Result<()> {
        self.request(Command::TogglePause).await?
    }

    pub async fn update_settings(&self, settings: Settings) -> Result<()> {
        self.request(|tx| Command::UpdateSettings(Box::new(settings), tx))
            .await
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Event stream. Handed out once; later calls return `None`.
    pub fn events(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events.take()
    }

    /// Tears the session down and waits for the controller task to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        self.request(Command::Shutdown).await?;
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| {
                ReadalongError::Other(format!("session controller task failed: {}", e))
            })?;
        }
        Ok(())
    }
}

/// Collaborators and channels the state handlers borrow while the state
/// itself is borrowed mutably.
struct Ports {
    settings: Settings,
    service: Arc<dyn SpeechService>,
    provider: Arc<dyn RegionProvider>,
    audio: Arc<dyn AudioBackend>,
    sink: Box<dyn HighlightSink>,
    internal: mpsc::UnboundedSender<Internal>,
    events: mpsc::Sender<SessionEvent>,
    status: watch::Sender<SessionStatus>,
}

/// What a handler wants done to the state once its borrow ends.
enum Transition {
    Stay,
    Finish,
    Fail(ReadalongError),
}

impl Ports {
    fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.events.try_send(event) {
            tracing::debug!(error = %e, "session event dropped");
        }
    }

    fn publish(&self, status: SessionStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        if changed {
            tracing::debug!(?status, "session status changed");
            self.emit(SessionEvent::StatusChanged(status));
        }
    }

    /// Requests every chunk the prefetch window allows; cached ones go
    /// straight to the reorder buffer.
    fn fill_linear(&self, linear: &mut LinearSession) {
        let range = linear.requestable(self.settings.linear_prefetch);
        linear.next_to_request = range.end;

        for chunk in range {
            let Some(request) = linear.core.request_for(chunk, &self.settings) else {
                continue;
            };
            if let Some(payload) = linear.core.index.cached_chunk(&request) {
                linear.ready.insert(chunk, payload);
                continue;
            }

            let session = linear.core.id;
            tracing::debug!(session, chunk, chars = request.text.len(), "requesting chunk");
            let service = Arc::clone(&self.service);
            let tx = self.internal.clone();
            let language = self.settings.language.clone();
            linear.requests.push(tokio::spawn(async move {
                let result = synthesize_chunk(&*service, &request, language.as_deref()).await;
                let message = Internal::LinearChunk {
                    session,
                    chunk,
                    request,
                    result,
                };
                if tx.send(message).is_err() {
                    tracing::debug!(session, chunk, "controller gone, dropping linear chunk");
                }
            }));
        }
    }

    /// Starts the next chunk if it is buffered and nothing is playing.
    ///
    /// Returns `true` once every chunk has been played.
    fn advance_linear(&mut self, linear: &mut LinearSession) -> Result<bool> {
        if linear.core.playback.is_some() {
            return Ok(false);
        }
        if let Some(payload) = linear.ready.remove(&linear.next_to_play) {
            let chunk = linear.next_to_play;
            let offset = if chunk == linear.first_chunk {
                linear.start_offset
            } else {
                0
            };
            linear.next_to_play += 1;
            self.start_playback(&mut linear.core, chunk, &payload, offset)?;
            self.fill_linear(linear);
            return Ok(false);
        }
        Ok(linear.is_complete())
    }

    /// Replaces the session's audio with `chunk` and starts it at `offset`.
    ///
    /// A refused autoplay is not an error here: the scheduler is kept in its
    /// blocked state and the host is told to call `resume`.
    fn start_playback(
        &mut self,
        core: &mut SessionCore,
        chunk: usize,
        payload: &ChunkPayload,
        offset: usize,
    ) -> Result<()> {
        core.release_playback();

        let words = core
            .index
            .state(core.region)
            .map(|state| state.chunk_words(chunk).to_vec())
            .unwrap_or_default();
        let player = self.audio.open(&payload.audio)?;
        let mut scheduler = PlaybackScheduler::new(player, words, &payload.transcript);
        let started = scheduler.start(offset);
        if core.user_paused {
            scheduler.pause();
        }
        core.playback = Some(ActivePlayback { chunk, scheduler });

        tracing::debug!(session = core.id, region = %core.region, chunk, offset, "chunk playback started");
        self.emit(SessionEvent::ChunkStarted {
            region: core.region,
            chunk,
        });

        match started {
            Err(e) if e.is_playback_blocked() => {
                self.emit(SessionEvent::PlaybackBlocked);
                Ok(())
            }
            other => other,
        }
    }

    /// Ticks the session's scheduler and moves the cursor with the highlight.
    fn tick_core(&mut self, core: &mut SessionCore) -> TickOutcome {
        let Some(active) = core.playback.as_mut() else {
            return TickOutcome::Idle;
        };
        let outcome = active.scheduler.tick(self.sink.as_mut());
        if let TickOutcome::Highlighted(offset) = outcome
            && let Some(start) = core
                .index
                .state(core.region)
                .and_then(|state| state.chunk_start(active.chunk))
        {
            core.word = start + offset;
        }
        outcome
    }

    fn request_roam(&mut self, roam: &mut RoamSession, token: u64) -> Result<()> {
        let core = &mut roam.core;
        let Some(state) = core.index.state(core.region) else {
            return Ok(());
        };
        let (Some(chunk), Some(offset)) = (state.chunk_of(core.word), state.offset_in_chunk(core.word))
        else {
            return Ok(());
        };
        let Some(request) = core.request_for(chunk, &self.settings) else {
            return Ok(());
        };

        roam.pending = None;
        if let Some(payload) = core.index.cached_chunk(&request) {
            return self.start_playback(core, chunk, &payload, offset);
        }

        let session = core.id;
        tracing::debug!(session, token, chunk, "requesting roam chunk");
        let service = Arc::clone(&self.service);
        let tx = self.internal.clone();
        let language = self.settings.language.clone();
        let mut task = TaskSet::default();
        task.push(tokio::spawn(async move {
            let result = synthesize_chunk(&*service, &request, language.as_deref()).await;
            let message = Internal::RoamChunk {
                token,
                session,
                chunk,
                request,
                result,
            };
            if tx.send(message).is_err() {
                tracing::debug!(session, token, chunk, "controller gone, dropping roam chunk");
            }
        }));
        roam.pending = Some(PendingRoam {
            token,
            chunk,
            _task: task,
        });
        Ok(())
    }
}

/// The navigation state machine.
pub struct SessionController {
    ports: Ports,
    state: SessionState,
    debouncer: Debouncer<Internal>,
    next_session: u64,
}

impl SessionController {
    /// Spawns the controller on the current tokio runtime.
    pub fn spawn(
        settings: Settings,
        service: Arc<dyn SpeechService>,
        provider: Arc<dyn RegionProvider>,
        audio: Arc<dyn AudioBackend>,
        sink: Box<dyn HighlightSink>,
    ) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (status_tx, status_rx) = watch::channel(SessionStatus::Idle);

        tracing::debug!(sink = sink.name(), "starting session controller");
        let controller = Self {
            ports: Ports {
                settings,
                service,
                provider,
                audio,
                sink,
                internal: internal_tx.clone(),
                events: event_tx,
                status: status_tx,
            },
            state: SessionState::default(),
            debouncer: Debouncer::new(internal_tx),
            next_session: 0,
        };
        let task = tokio::spawn(controller.run(command_rx, internal_rx));

        SessionHandle {
            commands: command_tx,
            status: status_rx,
            events: Some(event_rx),
            task: Some(task),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        let mut period = self.ports.settings.tick;
        let mut ticker = ticker(period);
        let mut shutdown_reply = None;

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(Command::Shutdown(reply)) => {
                            shutdown_reply = Some(reply);
                            break;
                        }
                        Some(command) => self.handle_command(command),
                        None => break,
                    }
                    if self.ports.settings.tick != period {
                        period = self.ports.settings.tick;
                        ticker = self::ticker(period);
                    }
                }
                Some(message) = internal.recv() => self.handle_internal(message),
                _ = ticker.tick() => self.tick(),
            }
        }

        self.teardown();
        tracing::debug!("session controller stopped");
        if let Some(reply) = shutdown_reply {
            reply_to("shutdown", reply, ());
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Activate(activation, reply) => {
                reply_to("activate", reply, self.activate(activation));
            }
            Command::Step(direction, reply) => {
                reply_to("step", reply, self.step(direction));
            }
            Command::Stop(reply) => {
                self.stop();
                reply_to("stop", reply, ());
            }
            Command::Resume(reply) => {
                reply_to("resume", reply, self.resume());
            }
            Command::TogglePause(reply) => {
                reply_to("toggle_pause", reply, self.toggle_pause());
            }
            Command::UpdateSettings(settings, reply) => {
                tracing::debug!(max_chars = settings.max_chars, voice = %settings.voice, "settings updated");
                self.ports.settings = *settings;
                reply_to("update_settings", reply, ());
            }
            Command::Shutdown(reply) => {
                self.teardown();
                reply_to("shutdown", reply, ());
            }
        }
    }

    fn activate(&mut self, activation: Activation) -> Result<()> {
        if activation.trigger == Trigger::Selection && !self.ports.settings.auto_activate_on_selection {
            tracing::debug!("selection ignored, auto-activation disabled");
            return Ok(());
        }

        let provider = Arc::clone(&self.ports.provider);
        let max_chars = self.ports.settings.max_chars;
        let (region, point) = match activation.target {
            ActivationTarget::Region(region) => (region, None),
            ActivationTarget::Point(point) => {
                let region = provider.region_at(point).ok_or_else(|| {
                    ReadalongError::Other("no readable region at the selected point".to_string())
                })?;
                (region, Some(point))
            }
        };

        let mut index = ElementIndex::new();
        let state = index.ensure_state(&*provider, region, max_chars)?;
        let word = activation
            .start_word
            .or_else(|| point.and_then(|p| state.word_at(p.container, p.offset)))
            .unwrap_or(0);
        let word_count = state.word_count();

        let mut core = SessionCore::new(self.next_session + 1, region, word.min(word_count.saturating_sub(1)), index);
        if word_count == 0 {
            let Some((next, word)) = core.step_target(&*provider, Direction::Forward, max_chars)? else {
                return Err(ReadalongError::Other(format!("nothing readable from {}", region)));
            };
            core.region = next;
            core.word = word;
        }

        // The new session is valid; the previous one goes away now.
        self.teardown();
        self.next_session += 1;
        tracing::debug!(
            session = core.id,
            region = %core.region,
            word = core.word,
            trigger = ?activation.trigger,
            "session activated"
        );

        match self.ports.settings.reading_mode {
            ReadingMode::WordByWord => self.enter_roaming(core),
            ReadingMode::Linear => self.enter_linear(core)?,
        }
        Ok(())
    }

    fn enter_linear(&mut self, core: SessionCore) -> Result<()> {
        let Some(state) = core.element() else {
            return Err(ReadalongError::UnknownRegion {
                region: core.region.0,
            });
        };
        let first_chunk = state.chunk_of(core.word).unwrap_or(0);
        let start_offset = state.offset_in_chunk(core.word).unwrap_or(0);
        let chunk_count = state.chunks().len();

        let mut linear = LinearSession::new(core, first_chunk, start_offset, chunk_count);
        self.ports.fill_linear(&mut linear);
        tracing::debug!(
            chunks = chunk_count,
            first_chunk,
            in_flight = linear.requests.len(),
            buffered = linear.ready.len(),
            "linear read started"
        );
        self.state = SessionState::LinearPlaying(linear);
        self.ports.publish(SessionStatus::LinearPlaying);
        Ok(())
    }

    /// Roams from the core's cursor: highlight now, request after the debounce.
    fn enter_roaming(&mut self, mut core: SessionCore) {
        core.release_playback();
        core.user_paused = false;
        if let Some(word) = core.element().and_then(|state| state.words().get(core.word)) {
            self.ports.sink.highlight(word);
        }
        self.debouncer
            .schedule(self.ports.settings.debounce, |token| Internal::DebounceElapsed { token });
        self.state = SessionState::Roaming(RoamSession::new(core));
        self.ports.publish(SessionStatus::Roaming);
    }

    fn step(&mut self, direction: Direction) -> StepOutcome {
        let provider = Arc::clone(&self.ports.provider);
        // A running linear plan keeps its chunking; rechunking under it
        // would shift the words its buffered chunks map to.
        let max_chars = match &self.state {
            SessionState::LinearPlaying(linear) => linear
                .core
                .element()
                .map_or(self.ports.settings.max_chars, ElementState::max_chars),
            _ => self.ports.settings.max_chars,
        };
        let Some(core) = self.state.core_mut() else {
            return StepOutcome::NoSession;
        };

        let target = match core.step_target(&*provider, direction, max_chars) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(error = %e, "step failed to read region");
                None
            }
        };
        let Some((region, word)) = target else {
            tracing::debug!(?direction, region = %core.region, word = core.word, "navigation dead end");
            return StepOutcome::DeadEnd;
        };

        let Some(mut core) = std::mem::take(&mut self.state).into_core() else {
            return StepOutcome::NoSession;
        };
        core.region = region;
        core.word = word;
        self.enter_roaming(core);
        StepOutcome::Moved { region, word }
    }

    fn stop(&mut self) {
        let active = !matches!(self.state, SessionState::Idle { retained: None });
        self.teardown();
        if active {
            tracing::debug!("session stopped");
            self.ports.emit(SessionEvent::Stopped);
        }
    }

    /// Ends the current session: audio released, highlight cleared, pending
    /// work aborted.
    fn teardown(&mut self) {
        self.debouncer.cancel();
        if let Some(mut core) = std::mem::take(&mut self.state).into_core() {
            core.release_playback();
            self.ports.sink.clear();
        }
        self.ports.publish(SessionStatus::Idle);
    }

    fn resume(&mut self) -> Result<()> {
        let Some(core) = self.state.core_mut() else {
            return Ok(());
        };
        core.user_paused = false;
        match core.playback.as_mut() {
            Some(active) => active.scheduler.resume(),
            None => Ok(()),
        }
    }

    fn toggle_pause(&mut self) -> Result<()> {
        let Some(core) = self.state.core_mut() else {
            return Ok(());
        };
        match core.playback.as_mut() {
            Some(active) if active.scheduler.state() == PlaybackState::Playing => {
                active.scheduler.pause();
                core.user_paused = true;
                Ok(())
            }
            Some(active) => {
                core.user_paused = false;
                active.scheduler.resume()
            }
            // Waiting for audio: the next chunk starts paused.
            None => {
                core.user_paused = !core.user_paused;
                Ok(())
            }
        }
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::LinearChunk {
                session,
                chunk,
                request,
                result,
            } => {
                let SessionState::LinearPlaying(linear) = &mut self.state else {
                    tracing::debug!(session, chunk, "dropping stale linear chunk");
                    return;
                };
                if linear.core.id != session {
                    tracing::debug!(session, chunk, "dropping stale linear chunk");
                    return;
                }
                let transition = match result {
                    Ok(payload) => {
                        let payload = Arc::new(payload);
                        linear.core.index.insert_chunk(request, Arc::clone(&payload));
                        linear.ready.insert(chunk, payload);
                        match self.ports.advance_linear(linear) {
                            Ok(true) => Transition::Finish,
                            Ok(false) => Transition::Stay,
                            Err(e) => Transition::Fail(e),
                        }
                    }
                    Err(e) => Transition::Fail(ReadalongError::ChunkSynthesis {
                        chunk,
                        message: e.to_string(),
                    }),
                };
                self.apply(transition);
            }
            Internal::DebounceElapsed { token } => {
                if !self.debouncer.is_current(token) {
                    tracing::debug!(token, "dropping superseded debounce");
                    return;
                }
                let SessionState::Roaming(roam) = &mut self.state else {
                    return;
                };
                if let Err(e) = self.ports.request_roam(roam, token) {
                    self.roam_failure(e);
                }
            }
            Internal::RoamChunk {
                token,
                session,
                chunk,
                request,
                result,
            } => {
                let SessionState::Roaming(roam) = &mut self.state else {
                    tracing::debug!(token, chunk, "dropping stale roam chunk");
                    return;
                };
                let awaited = roam
                    .pending
                    .as_ref()
                    .is_some_and(|pending| pending.token == token && pending.chunk == chunk);
                if roam.core.id != session || !awaited || !self.debouncer.is_current(token) {
                    tracing::debug!(token, chunk, "dropping stale roam chunk");
                    return;
                }
                roam.pending = None;

                let payload = match result {
                    Ok(payload) => Arc::new(payload),
                    Err(e) => {
                        self.roam_failure(ReadalongError::ChunkSynthesis {
                            chunk,
                            message: e.to_string(),
                        });
                        return;
                    }
                };
                roam.core.index.insert_chunk(request, Arc::clone(&payload));

                let core = &mut roam.core;
                let offset = core.element().and_then(|state| {
                    (state.chunk_of(core.word) == Some(chunk))
                        .then(|| state.offset_in_chunk(core.word))
                        .flatten()
                });
                let Some(offset) = offset else {
                    tracing::debug!(token, chunk, "roam chunk no longer under the cursor");
                    return;
                };
                if let Err(e) = self.ports.start_playback(core, chunk, &payload, offset) {
                    self.roam_failure(e);
                }
            }
        }
    }

    fn tick(&mut self) {
        let transition = match &mut self.state {
            SessionState::LinearPlaying(linear) => {
                match self.ports.tick_core(&mut linear.core) {
                    TickOutcome::Ended => {
                        linear.core.release_playback();
                        match self.ports.advance_linear(linear) {
                            Ok(true) => Transition::Finish,
                            Ok(false) => Transition::Stay,
                            Err(e) => Transition::Fail(e),
                        }
                    }
                    _ => Transition::Stay,
                }
            }
            SessionState::Roaming(roam) => {
                // Roam audio stops at the end of its chunk; the cursor stays
                // on the last highlighted word.
                if self.ports.tick_core(&mut roam.core) == TickOutcome::Ended {
                    roam.core.release_playback();
                }
                Transition::Stay
            }
            SessionState::Idle { .. } => Transition::Stay,
        };
        self.apply(transition);
    }

    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Stay => {}
            Transition::Finish => {
                let core = std::mem::take(&mut self.state).into_core();
                if let Some(core) = &core {
                    tracing::debug!(session = core.id, region = %core.region, "linear read finished");
                }
                self.state = SessionState::Idle { retained: core };
                self.ports.publish(SessionStatus::Idle);
                self.ports.emit(SessionEvent::Finished);
            }
            Transition::Fail(e) => {
                tracing::warn!(error = %e, "linear read aborted");
                self.teardown();
                self.ports.emit(SessionEvent::Failed {
                    message: e.to_string(),
                    fatal: true,
                });
            }
        }
    }

    /// Roam failures are reported; the session and cursor stay put.
    fn roam_failure(&mut self, e: ReadalongError) {
        tracing::warn!(error = %e, "roam chunk failed");
        self.ports.emit(SessionEvent::Failed {
            message: e.to_string(),
            fatal: false,
        });
    }
}

/// Replies to a host command; the host may have stopped waiting.
fn reply_to<T>(command: &'static str, reply: oneshot::Sender<T>, value: T) {
    if reply.send(value).is_err() {
        tracing::debug!(command, "caller dropped before the reply");
    }
}

fn ticker(period: Duration) -> Interval {
    // `interval` panics on a zero period.
    let mut ticker = tokio::time::interval(period.max(MIN_TICK));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
