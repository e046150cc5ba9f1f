//! Messages and values exchanged with the session controller.

use crate::config::Settings;
use crate::document::region::{Direction, DocumentPoint, RegionId};
use crate::error::Result;
use crate::speech::service::{ChunkPayload, SynthesisRequest};
use serde::Serialize;
use tokio::sync::oneshot;

/// What the host asked to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationTarget {
    Region(RegionId),
    /// Resolved through the region provider; the point also picks the start word.
    Point(DocumentPoint),
}

/// Where an activation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trigger {
    /// A text selection. Ignored unless auto-activation is enabled.
    Selection,
    Toolbar,
    /// Region chosen by an external content-selection collaborator.
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub target: ActivationTarget,
    /// Word index within the region to start from.
    pub start_word: Option<usize>,
    pub trigger: Trigger,
}

impl Activation {
    pub fn region(region: RegionId) -> Self {
        Self {
            target: ActivationTarget::Region(region),
            start_word: None,
            trigger: Trigger::Toolbar,
        }
    }

    pub fn at_point(point: DocumentPoint, trigger: Trigger) -> Self {
        Self {
            target: ActivationTarget::Point(point),
            start_word: None,
            trigger,
        }
    }

    pub fn with_start_word(mut self, word: usize) -> Self {
        self.start_word = Some(word);
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }
}

/// Coarse session mode, published on the status watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionStatus {
    #[default]
    Idle,
    LinearPlaying,
    Roaming,
}

/// Result of a directional step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The cursor moved to `word` of `region`.
    Moved { region: RegionId, word: usize },
    /// No readable word in that direction; nothing changed.
    DeadEnd,
    /// There is no session to step in.
    NoSession,
}

/// Notifications for the host UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionEvent {
    StatusChanged(SessionStatus),
    /// Audio for a chunk started (or is waiting on a gesture).
    ChunkStarted { region: RegionId, chunk: usize },
    /// Audio needs a user gesture; call `resume` from one.
    PlaybackBlocked,
    /// A speech or audio failure. `fatal` failures ended the session.
    Failed { message: String, fatal: bool },
    /// A linear read reached the end of its region.
    Finished,
    Stopped,
}

pub(crate) enum Command {
    Activate(Activation, oneshot::Sender<Result<()>>),
    Step(Direction, oneshot::Sender<StepOutcome>),
    Stop(oneshot::Sender<()>),
    Resume(oneshot::Sender<Result<()>>),
    TogglePause(oneshot::Sender<Result<()>>),
    UpdateSettings(Box<Settings>, oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Results of work the controller spawned, fed back into its loop.
pub(crate) enum Internal {
    LinearChunk {
        session: u64,
        chunk: usize,
        request: SynthesisRequest,
        result: Result<ChunkPayload>,
    },
    DebounceElapsed {
        token: u64,
    },
    RoamChunk {
        token: u64,
        session: u64,
        chunk: usize,
        request: SynthesisRequest,
        result: Result<ChunkPayload>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::region::ContainerRef;

    #[test]
    fn test_activation_builders() {
        let activation = Activation::region(RegionId(3)).with_start_word(4);
        assert_eq!(activation.target, ActivationTarget::Region(RegionId(3)));
        assert_eq!(activation.start_word, Some(4));
        assert_eq!(activation.trigger, Trigger::Toolbar);

        let point = DocumentPoint {
            container: ContainerRef(1),
            offset: 0,
        };
        let selected = Activation::at_point(point, Trigger::Selection);
        assert_eq!(selected.trigger, Trigger::Selection);
        assert_eq!(selected.with_trigger(Trigger::Agent).trigger, Trigger::Agent);
    }

    #[test]
    fn test_event_serializes() {
        let json = serde_json::to_string(&SessionEvent::StatusChanged(SessionStatus::Roaming)).unwrap();
        assert_eq!(json, r#"{"StatusChanged":"Roaming"}"#);
    }
}
