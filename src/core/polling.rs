//! Cancellable polling
//!
//! Every wait in a session is a loop of "check a condition, sleep one
//! interval". The loop looks at the cancellation token before each check,
//! so a signal is noticed within one interval.

use std::time::Duration;

use crate::signals::CancelToken;

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The condition held.
    Satisfied,
    /// A signal asked the session to stop first.
    Cancelled(i32),
}

/// A polling loop bound to one interval and one cancellation token.
#[derive(Debug, Clone)]
pub struct PollLoop {
    interval: Duration,
    cancel: CancelToken,
}

impl PollLoop {
    pub fn new(interval: Duration, cancel: CancelToken) -> Self {
        Self { interval, cancel }
    }

    /// Poll `done` until it returns true or cancellation is requested.
    pub fn until<F>(&self, mut done: F) -> PollOutcome
    where
        F: FnMut() -> bool,
    {
        loop {
            if let Some(signum) = self.cancel.requested() {
                return PollOutcome::Cancelled(signum);
            }
            if done() {
                return PollOutcome::Satisfied;
            }
            std::thread::sleep(self.interval);
        }
    }

    /// Poll `done` until it returns true, ignoring cancellation.
    ///
    /// Only cleanup uses this; a second signal must not cut it short.
    pub fn until_uncancellable<F>(&self, mut done: F)
    where
        F: FnMut() -> bool,
    {
        while !done() {
            std::thread::sleep(self.interval);
        }
    }
}
