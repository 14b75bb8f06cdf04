//! Signal delivery into the session
//!
//! The handlers registered here only record which signal arrived. The
//! session controller notices the request at its next polling point and
//! runs cleanup from its own thread of control.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::SigId;

/// Signals that end a session early.
pub const CANCEL_SIGNALS: [i32; 2] = [SIGINT, SIGTERM];

/// Shared cancellation request; zero means none.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    signum: Arc<AtomicUsize>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation on behalf of `signum`.
    pub fn request(&self, signum: i32) {
        self.signum.store(signum as usize, Ordering::SeqCst);
    }

    /// The signal that requested cancellation, if any.
    pub fn requested(&self) -> Option<i32> {
        match self.signum.load(Ordering::SeqCst) {
            0 => None,
            signum => Some(signum as i32),
        }
    }
}

/// Route SIGINT and SIGTERM into `token`.
pub fn install(token: &CancelToken) -> std::io::Result<Vec<SigId>> {
    CANCEL_SIGNALS
        .iter()
        .map(|&signum| {
            signal_hook::flag::register_usize(signum, Arc::clone(&token.signum), signum as usize)
        })
        .collect()
}
