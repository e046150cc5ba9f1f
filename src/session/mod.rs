//! Session lifecycle: the navigation state machine and its helpers.

pub mod controller;
pub mod debounce;
pub(crate) mod state;
pub mod types;

pub use controller::{SessionController, SessionHandle};
pub use debounce::Debouncer;
pub use types::{Activation, ActivationTarget, SessionEvent, SessionStatus, StepOutcome, Trigger};
