//! Recording session lifecycle
//!
//! A [`SessionController`] takes the monitor from whatever configuration it
//! had, through one recording of one target, and back to that
//! configuration. The states it walks through are:
//!
//! ```text
//! Idle -> AttrsApplied -> TargetAttached -> Monitoring -> Draining -> Cleanup -> Exited
//! ```
//!
//! Any failure after the snapshot, and any signal, jumps straight to
//! `Cleanup`. Cleanup runs exactly once per controller.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Child;
use std::time::{Duration, Instant};

use crate::attrs::AttributeSet;
use crate::constants::{exit_codes, polling, OLD_OUTPUT_SUFFIX};
use crate::core::polling::{PollLoop, PollOutcome};
use crate::error::Result;
use crate::signals::CancelToken;
use crate::surface::ControlSurface;
use crate::target::{spawn_command, Target};

/// Session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between status checks while waiting
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: polling::STANDARD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AttrsApplied,
    TargetAttached,
    Monitoring,
    Draining,
    Cleanup,
    Exited,
}

/// Why a session went to cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionExit {
    Completed,
    AttrsApplyFailed,
    TargetAttachFailed,
    ActivationFailed,
    Signalled(i32),
}

impl SessionExit {
    /// Process exit code for this outcome.
    pub fn code(self) -> i32 {
        match self {
            SessionExit::Completed => exit_codes::SUCCESS,
            SessionExit::AttrsApplyFailed => exit_codes::ATTRS_APPLY_FAILED,
            SessionExit::TargetAttachFailed => exit_codes::TARGET_ATTACH_FAILED,
            SessionExit::ActivationFailed => exit_codes::ACTIVATION_FAILED,
            SessionExit::Signalled(signum) => signum,
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub target: Target,
    pub target_pid: Option<u64>,
    pub requested: AttributeSet,
    pub snapshot: AttributeSet,
    pub states: Vec<SessionState>,
    pub exit: SessionExit,
    pub exit_code: i32,
    /// Whether the snapshot was written back successfully
    pub restored: bool,
    /// Where an earlier recording at the output path was moved
    pub previous_output: Option<PathBuf>,
    pub elapsed_secs: f64,
}

/// Drives one recording session over a control surface.
pub struct SessionController<S: ControlSurface> {
    surface: S,
    snapshot: AttributeSet,
    cancel: CancelToken,
    poll: PollLoop,
    state: SessionState,
    states: Vec<SessionState>,
    child: Option<Child>,
    target_pid: Option<u64>,
    previous_output: Option<PathBuf>,
    restored: Option<bool>,
}

impl<S: ControlSurface> SessionController<S> {
    /// Snapshot the current attributes of `surface` and get ready to run.
    ///
    /// Without a readable snapshot nothing could be restored afterwards, so
    /// a failed read is returned as an error and no session is entered.
    pub fn start(surface: S, cancel: CancelToken, config: SessionConfig) -> Result<Self> {
        let snapshot = surface.read_attributes()?;
        log::info!("current damon attrs: {}", snapshot);

        Ok(Self {
            surface,
            snapshot,
            poll: PollLoop::new(config.poll_interval, cancel.clone()),
            cancel,
            state: SessionState::Idle,
            states: vec![SessionState::Idle],
            child: None,
            target_pid: None,
            previous_output: None,
            restored: None,
        })
    }

    /// Record `target` with `requested` attributes, then restore the
    /// snapshot.
    pub fn run(mut self, requested: &AttributeSet, target: &Target) -> SessionReport {
        let started = Instant::now();

        let exit = self.drive(requested, target);
        let restored = self.cleanup();
        self.transition(SessionState::Exited);

        if let Some(child) = self.child.as_mut() {
            match exit {
                SessionExit::TargetAttachFailed | SessionExit::ActivationFailed => {
                    stop_unmonitored(child)
                }
                _ => {
                    if let Ok(None) = child.try_wait() {
                        log::warn!("launched target (pid {}) is still running", child.id());
                    }
                }
            }
        }

        SessionReport {
            target: target.clone(),
            target_pid: self.target_pid,
            requested: requested.clone(),
            snapshot: self.snapshot.clone(),
            states: self.states.clone(),
            exit,
            exit_code: exit.code(),
            restored,
            previous_output: self.previous_output.clone(),
            elapsed_secs: started.elapsed().as_secs_f64(),
        }
    }

    /// Turn monitoring off if it is on, then write the snapshot back.
    ///
    /// Only the first call does any work; later calls return the first
    /// call's result. Returns whether the snapshot was restored.
    pub fn cleanup(&mut self) -> bool {
        if let Some(restored) = self.restored {
            return restored;
        }
        self.transition(SessionState::Cleanup);

        if self.surface.is_running() {
            match self.surface.turn_off() {
                Ok(()) => self.poll.until_uncancellable(|| !self.surface.is_running()),
                Err(e) => log::error!("failed to turn damon off: {}", e),
            }
        }

        let restored = match self.snapshot.apply_to(&mut self.surface) {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "original attributes ({}) restoration failed: {}",
                    self.snapshot,
                    e
                );
                false
            }
        };
        self.restored = Some(restored);
        restored
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn states(&self) -> &[SessionState] {
        &self.states
    }

    /// Attributes that cleanup restores.
    pub fn snapshot(&self) -> &AttributeSet {
        &self.snapshot
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn target_pid(&self) -> Option<u64> {
        self.target_pid
    }

    fn drive(&mut self, requested: &AttributeSet, target: &Target) -> SessionExit {
        match rotate_previous_output(requested.output_path()) {
            Ok(moved) => self.previous_output = moved,
            Err(e) => {
                log::error!(
                    "could not move previous recording {} aside: {}",
                    requested.output_path().display(),
                    e
                );
                return SessionExit::AttrsApplyFailed;
            }
        }
        if let Err(e) = requested.apply_to(&mut self.surface) {
            log::error!("attributes ({}) failed to be applied: {}", requested, e);
            return SessionExit::AttrsApplyFailed;
        }
        log::info!("damon attrs: {}", requested);
        self.transition(SessionState::AttrsApplied);

        if let Some(signum) = self.cancel.requested() {
            return signalled(signum);
        }
        let pid = match self.attach(target) {
            Ok(pid) => pid,
            Err(e) => {
                log::error!("target ({}) setting failed: {}", target, e);
                return SessionExit::TargetAttachFailed;
            }
        };
        self.transition(SessionState::TargetAttached);

        if let Err(e) = self.surface.turn_on() {
            log::error!("could not turn on damon for pid {}: {}", pid, e);
            return SessionExit::ActivationFailed;
        }
        // the monitor may take a moment to report itself active
        if let PollOutcome::Cancelled(signum) = self.poll.until(|| self.surface.is_running()) {
            return signalled(signum);
        }
        self.transition(SessionState::Monitoring);
        log::info!("Press Ctrl+C to stop");

        self.transition(SessionState::Draining);
        if let Some(child) = self.child.as_mut() {
            if let PollOutcome::Cancelled(signum) = self.poll.until(|| child_exited(child)) {
                return signalled(signum);
            }
        }
        // the monitor turns itself off once every target has exited
        match self.poll.until(|| !self.surface.is_running()) {
            PollOutcome::Satisfied => SessionExit::Completed,
            PollOutcome::Cancelled(signum) => signalled(signum),
        }
    }

    fn attach(&mut self, target: &Target) -> Result<u64> {
        let pid = match target {
            Target::Command(command) => {
                let child = spawn_command(command)?;
                let pid = u64::from(child.id());
                log::info!("launched '{}' as pid {}", command, pid);
                self.child = Some(child);
                pid
            }
            Target::Pid(pid) => *pid,
        };
        self.target_pid = Some(pid);
        self.surface.set_target(pid)?;
        Ok(pid)
    }

    fn transition(&mut self, next: SessionState) {
        log::debug!("session state {:?} -> {:?}", self.state, next);
        self.state = next;
        self.states.push(next);
    }
}

impl<S: ControlSurface> Drop for SessionController<S> {
    fn drop(&mut self) {
        if self.restored.is_none() {
            self.cleanup();
        }
    }
}

fn signalled(signum: i32) -> SessionExit {
    log::info!("signal {} received", signum);
    SessionExit::Signalled(signum)
}

fn child_exited(child: &mut Child) -> bool {
    match child.try_wait() {
        Ok(Some(status)) => {
            log::info!("target process {} exited ({})", child.id(), status);
            true
        }
        Ok(None) => false,
        Err(e) => {
            log::warn!("cannot wait on target process {}: {}", child.id(), e);
            true
        }
    }
}

// The target was launched but never monitored; don't leave it behind.
fn stop_unmonitored(child: &mut Child) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    log::info!("stopping unmonitored target process {}", child.id());
    if let Err(e) = child.kill() {
        log::warn!("failed to kill target process {}: {}", child.id(), e);
        return;
    }
    if let Err(e) = child.wait() {
        log::warn!("failed to reap target process {}: {}", child.id(), e);
    }
}

/// Move an existing recording at `path` to `<path>.old`.
///
/// Returns the new location when something was moved.
pub fn rotate_previous_output(path: &Path) -> std::io::Result<Option<PathBuf>> {
    if !path.is_file() {
        return Ok(None);
    }

    let mut old = path.as_os_str().to_owned();
    old.push(OLD_OUTPUT_SUFFIX);
    let old = PathBuf::from(old);
    fs::rename(path, &old)?;
    log::info!("moved previous recording to {}", old.display());
    Ok(Some(old))
}
