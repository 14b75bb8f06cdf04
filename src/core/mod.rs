//! Session core
//!
//! This module contains the recording session state machine and the
//! polling loop it waits with.

pub mod polling;
pub mod session;

// Re-export main types
pub use polling::{PollLoop, PollOutcome};
pub use session::{SessionConfig, SessionController, SessionExit, SessionReport, SessionState};
