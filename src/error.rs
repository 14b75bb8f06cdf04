use std::path::PathBuf;
use thiserror::Error;

use crate::constants::exit_codes;

/// Errors produced while preparing or driving a recording session.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The recorder needs root to write the control entries.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The control directory or one of its entries is missing.
    #[error("damon control entry ({path}) not found")]
    SurfaceUnavailable { path: PathBuf },

    /// A control entry exists but could not be read.
    #[error("failed to read {path}: {source}")]
    ControlRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A control entry returned text that does not match its row format.
    #[error("malformed {entry} row: {content:?}")]
    Parse {
        entry: &'static str,
        content: String,
    },

    /// Writing a value to a control entry failed.
    #[error("failed to write '{value}' to {path}: {source}")]
    ControlWrite {
        path: PathBuf,
        value: String,
        #[source]
        source: std::io::Error,
    },

    #[error("target '{0}' is neither a command, nor a pid")]
    InvalidTarget(String),

    /// Requested attributes the monitor would reject.
    #[error("invalid attributes: {0}")]
    InvalidAttributes(String),

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RecordError {
    /// Exit code for an error that ends the process before a session starts.
    pub fn exit_code(&self) -> i32 {
        exit_codes::FATAL
    }
}

pub type Result<T> = std::result::Result<T, RecordError>;
