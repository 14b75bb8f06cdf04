//! Monitor control surface
//!
//! The monitor is driven through four control entries under
//! `<debugfs>/damon/`: `attrs`, `record`, `pids` and `monitor_on`. Every
//! operation here is a single read or write of one entry.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::attrs::AttributeSet;
use crate::constants::entries;
use crate::error::{RecordError, Result};

/// Single-step operations on the monitor's control entries.
///
/// Implementations are owned by one session controller for the whole
/// session; nothing else is expected to write the entries meanwhile.
pub trait ControlSurface {
    /// Raw parameter row, as read.
    fn read_attrs_row(&self) -> Result<String>;

    /// Raw buffer row, as read.
    fn read_record_row(&self) -> Result<String>;

    fn write_attrs_row(&mut self, row: &str) -> Result<()>;

    fn write_record_row(&mut self, row: &str) -> Result<()>;

    /// Point the monitor at a process id.
    fn set_target(&mut self, pid: u64) -> Result<()>;

    fn turn_on(&mut self) -> Result<()>;

    fn turn_off(&mut self) -> Result<()>;

    /// Whether the monitor reports itself active.
    fn is_running(&self) -> bool;

    fn read_attributes(&self) -> Result<AttributeSet> {
        AttributeSet::from_surface(self)
    }

    fn write_attributes(&mut self, attrs: &AttributeSet) -> Result<()> {
        attrs.apply_to(self)
    }
}

/// Control surface backed by the DAMON debugfs files.
#[derive(Debug, Clone)]
pub struct DebugfsSurface {
    dir: PathBuf,
    attrs: PathBuf,
    record: PathBuf,
    pids: PathBuf,
    monitor_on: PathBuf,
}

impl DebugfsSurface {
    /// Locate the control entries below the debugfs mount `debugfs`.
    ///
    /// Fails with [`RecordError::SurfaceUnavailable`] if the `damon`
    /// directory or any of its four entries is missing.
    pub fn open(debugfs: impl AsRef<Path>) -> Result<Self> {
        let dir = debugfs.as_ref().join(entries::DIR);
        if !dir.is_dir() {
            return Err(RecordError::SurfaceUnavailable { path: dir });
        }

        let surface = Self {
            attrs: dir.join(entries::ATTRS),
            record: dir.join(entries::RECORD),
            pids: dir.join(entries::PIDS),
            monitor_on: dir.join(entries::MONITOR_ON),
            dir,
        };
        for entry in [&surface.attrs, &surface.record, &surface.pids, &surface.monitor_on] {
            if !entry.is_file() {
                return Err(RecordError::SurfaceUnavailable {
                    path: entry.clone(),
                });
            }
        }

        log::debug!("using damon control entries in {}", surface.dir.display());
        Ok(surface)
    }

    fn read_entry(path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|source| RecordError::ControlRead {
            path: path.to_path_buf(),
            source,
        })
    }

    // Same shape as `echo value > entry`.
    fn write_entry(path: &Path, value: &str) -> Result<()> {
        let to_err = |source| RecordError::ControlWrite {
            path: path.to_path_buf(),
            value: value.to_string(),
            source,
        };
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(to_err)?;
        file.write_all(format!("{}\n", value).as_bytes())
            .map_err(to_err)?;
        log::debug!("wrote '{}' to {}", value, path.display());
        Ok(())
    }
}

impl ControlSurface for DebugfsSurface {
    fn read_attrs_row(&self) -> Result<String> {
        Self::read_entry(&self.attrs)
    }

    fn read_record_row(&self) -> Result<String> {
        Self::read_entry(&self.record)
    }

    fn write_attrs_row(&mut self, row: &str) -> Result<()> {
        Self::write_entry(&self.attrs, row)
    }

    fn write_record_row(&mut self, row: &str) -> Result<()> {
        Self::write_entry(&self.record, row)
    }

    fn set_target(&mut self, pid: u64) -> Result<()> {
        Self::write_entry(&self.pids, &pid.to_string())
    }

    fn turn_on(&mut self) -> Result<()> {
        Self::write_entry(&self.monitor_on, "on")
    }

    fn turn_off(&mut self) -> Result<()> {
        Self::write_entry(&self.monitor_on, "off")
    }

    fn is_running(&self) -> bool {
        match Self::read_entry(&self.monitor_on) {
            Ok(status) => status.trim() == "on",
            Err(e) => {
                log::warn!("{}; treating monitor as off", e);
                false
            }
        }
    }
}

/// Fail unless running with an effective uid of root.
#[cfg(target_os = "linux")]
pub fn ensure_root() -> Result<()> {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        return Err(RecordError::PermissionDenied(format!(
            "run as root (effective uid is {})",
            euid
        )));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn ensure_root() -> Result<()> {
    Err(RecordError::PermissionDenied(
        "the damon debugfs interface is only available on Linux".to_string(),
    ))
}
