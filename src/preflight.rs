//! Checks run before a session touches the monitor
//!
//! Everything here fails with exit code 1 and leaves the control entries
//! alone. The caller is expected to have checked for root first.

use std::path::Path;

use crate::attrs::{AttrRequest, AttributeSet};
use crate::error::Result;
use crate::surface::DebugfsSurface;
use crate::target::Target;

/// A target and attribute set that passed every check, and the surface to
/// record through.
#[derive(Debug)]
pub struct Prepared {
    pub target: Target,
    pub requested: AttributeSet,
    pub surface: DebugfsSurface,
}

/// Resolve the target, validate the requested attributes, then locate the
/// control entries below `debugfs`, in that order.
pub fn prepare(target: &str, request: &AttrRequest, debugfs: &Path) -> Result<Prepared> {
    let target = Target::resolve(target)?;

    let requested = AttributeSet::from_request(request);
    requested.validate()?;

    let surface = DebugfsSurface::open(debugfs)?;
    Ok(Prepared {
        target,
        requested,
        surface,
    })
}
