//! Record data access patterns of a process with DAMON.
//!
//! The library drives one recording session over the DAMON debugfs control
//! entries and always leaves the monitor configured as it found it.

pub mod attrs;
pub mod constants;
pub mod core;
pub mod error;
pub mod logging;
pub mod preflight;
pub mod signals;
pub mod surface;
pub mod target;

pub use attrs::{AttrRequest, AttributeSet};
pub use crate::core::{SessionConfig, SessionController, SessionExit, SessionReport, SessionState};
pub use error::{RecordError, Result};
pub use preflight::{prepare, Prepared};
pub use signals::CancelToken;
pub use surface::{ControlSurface, DebugfsSurface};
pub use target::Target;
