//! Session lifecycle: the orchestrator and its state machine.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{Orchestrator, RETRY_DELAY, SessionHandle, SessionOptions};
pub use state::{SessionPhase, SessionStatus};
