//! Recording targets
//!
//! A target is given on the command line as one string. It is either a
//! shell command to launch or the id of a process that is already running.

use serde::Serialize;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use crate::constants::SHELL;
use crate::error::{RecordError, Result};

/// What to record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Launched through the shell; the child's pid becomes the target.
    Command(String),
    /// An existing process. Existence, and range, is left for the monitor
    /// to judge.
    Pid(u64),
}

impl Target {
    /// Resolve `input` using the current `PATH`.
    pub fn resolve(input: &str) -> Result<Self> {
        let path = std::env::var_os("PATH");
        Self::resolve_with_path(input, path.as_deref())
    }

    /// Resolve `input` against an explicit search path.
    ///
    /// A runnable command name wins over a pid, so an executable named
    /// `1234` on the search path is launched rather than attached to.
    pub fn resolve_with_path(input: &str, search_path: Option<&OsStr>) -> Result<Self> {
        let Some(program) = input.split_whitespace().next() else {
            return Err(RecordError::InvalidTarget(input.to_string()));
        };

        if let Some(found) = find_executable(program, search_path) {
            log::debug!("target program '{}' resolved to {}", program, found.display());
            return Ok(Target::Command(input.to_string()));
        }

        match input.trim().parse::<u64>() {
            Ok(pid) if pid > 0 => Ok(Target::Pid(pid)),
            _ => Err(RecordError::InvalidTarget(input.to_string())),
        }
    }

    pub fn is_command(&self) -> bool {
        matches!(self, Target::Command(_))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Command(cmd) => write!(f, "{}", cmd),
            Target::Pid(pid) => write!(f, "{}", pid),
        }
    }
}

/// Launch `command` through the shell.
pub fn spawn_command(command: &str) -> Result<Child> {
    Command::new(SHELL)
        .arg("-c")
        .arg(command)
        .spawn()
        .map_err(|source| RecordError::Spawn {
            command: command.to_string(),
            source,
        })
}

/// Look `program` up the way a shell would: names containing a slash are
/// taken as paths, anything else is searched for on `search_path`.
pub fn find_executable(program: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    if program.contains('/') {
        let candidate = PathBuf::from(program);
        return is_executable(&candidate).then_some(candidate);
    }

    let search_path = search_path?;
    std::env::split_paths(search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match path.metadata() {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn make_executable(dir: &Path, name: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_command_on_path() {
        let tmp = TempDir::new().unwrap();
        make_executable(tmp.path(), "workload");
        let target =
            Target::resolve_with_path("workload --size 2", Some(tmp.path().as_os_str())).unwrap();
        assert_eq!(target, Target::Command("workload --size 2".to_string()));
    }

    #[test]
    fn test_pid_when_no_command_matches() {
        let tmp = TempDir::new().unwrap();
        let target = Target::resolve_with_path("99999999", Some(tmp.path().as_os_str())).unwrap();
        assert_eq!(target, Target::Pid(99_999_999));
    }

    #[test]
    fn test_pid_above_u32_left_to_monitor() {
        let tmp = TempDir::new().unwrap();
        let target = Target::resolve_with_path("4294967296", Some(tmp.path().as_os_str())).unwrap();
        assert_eq!(target, Target::Pid(4_294_967_296));
    }

    #[test]
    fn test_numeric_executable_wins_over_pid() {
        let tmp = TempDir::new().unwrap();
        make_executable(tmp.path(), "1234");
        let target = Target::resolve_with_path("1234", Some(tmp.path().as_os_str())).unwrap();
        assert_eq!(target, Target::Command("1234".to_string()));
    }

    #[test]
    fn test_non_executable_file_is_not_a_command() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("4321"), "data").unwrap();
        let target = Target::resolve_with_path("4321", Some(tmp.path().as_os_str())).unwrap();
        assert_eq!(target, Target::Pid(4321));
    }

    #[test]
    fn test_explicit_path_to_program() {
        let tmp = TempDir::new().unwrap();
        make_executable(tmp.path(), "run.sh");
        let input = format!("{} arg", tmp.path().join("run.sh").display());
        let target = Target::resolve_with_path(&input, None).unwrap();
        assert!(target.is_command());
    }

    #[test]
    fn test_invalid_targets() {
        let tmp = TempDir::new().unwrap();
        let path = Some(tmp.path().as_os_str());
        for input in ["", "   ", "no-such-program-here", "0", "-5", "12abc"] {
            let err = Target::resolve_with_path(input, path).unwrap_err();
            assert!(matches!(err, RecordError::InvalidTarget(_)), "{input:?}");
        }
    }

    #[test]
    fn test_spawn_command_runs_through_shell() {
        let mut child = spawn_command("exit 3").unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.code(), Some(3));
    }
}
