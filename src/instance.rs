//! Single-instance guard and stop signalling through a pidfile.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{info, warn};
use nix::{
    errno::Errno,
    sys::signal::{Signal, kill},
    unistd::Pid,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstanceError {
    #[error("sunrise_clockd is already running with pid {pid}")]
    AlreadyRunning { pid: i32 },
    #[error("sunrise_clockd is not running (no pidfile at {})", path.display())]
    NotRunning { path: PathBuf },
}

/// Result of a successful [`PidFile::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Signalled(i32),
    /// The recorded process no longer existed.
    AlreadyGone(i32),
}

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded pid, or `None` if there is no pidfile.
    pub fn read_pid(&self) -> Result<Option<i32>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read pidfile {}", self.path.display()));
            }
        };
        let pid: i32 = content
            .trim()
            .parse()
            .with_context(|| format!("Pidfile {} holds no pid", self.path.display()))?;
        anyhow::ensure!(pid > 0, "Pidfile {} holds invalid pid {pid}", self.path.display());
        Ok(Some(pid))
    }

    /// Fails with [`InstanceError::AlreadyRunning`] if the recorded process is
    /// alive. A stale or unreadable pidfile is removed.
    pub fn ensure_not_running(&self) -> Result<()> {
        match self.read_pid() {
            Ok(None) => Ok(()),
            Ok(Some(pid)) if is_process_alive(pid) => {
                Err(InstanceError::AlreadyRunning { pid }.into())
            }
            Ok(Some(pid)) => {
                warn!("Removing stale pidfile {} (pid {pid} is gone)", self.path.display());
                self.remove()
            }
            Err(e) => {
                warn!("Removing unusable pidfile: {e:#}");
                self.remove()
            }
        }
    }

    pub fn write_current(&self) -> Result<()> {
        let pid = std::process::id();
        fs::write(&self.path, format!("{pid}\n"))
            .with_context(|| format!("Failed to write pidfile {}", self.path.display()))?;
        info!("Wrote pid {pid} to {}", self.path.display());
        Ok(())
    }

    /// Removes the pidfile. A missing file is not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e)
                .with_context(|| format!("Failed to remove pidfile {}", self.path.display())),
            _ => Ok(()),
        }
    }

    /// Sends SIGTERM to the recorded process and removes the pidfile.
    pub fn stop(&self) -> Result<StopOutcome> {
        let pid = self.read_pid()?.ok_or_else(|| InstanceError::NotRunning {
            path: self.path.clone(),
        })?;

        let outcome = match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) => StopOutcome::Signalled(pid),
            Err(Errno::ESRCH) => {
                warn!("No process with pid {pid}, removing pidfile");
                StopOutcome::AlreadyGone(pid)
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to signal pid {pid}")),
        };
        self.remove()?;
        Ok(outcome)
    }
}

/// Probes `pid` with signal 0. A permission error still means it exists.
pub fn is_process_alive(pid: i32) -> bool {
    pid > 0 && matches!(kill(Pid::from_raw(pid), None), Ok(()) | Err(Errno::EPERM))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::os::unix::process::ExitStatusExt;
    use tempfile::TempDir;

    // Above the kernel's pid_max, so never alive.
    const DEAD_PID: i32 = i32::MAX;

    fn pidfile(dir: &TempDir) -> PidFile {
        PidFile::new(dir.path().join("sunrise_clockd.pid"))
    }

    #[test]
    fn missing_pidfile_allows_start() {
        let dir = TempDir::new().unwrap();
        let pidfile = pidfile(&dir);

        assert_eq!(pidfile.read_pid().unwrap(), None);
        pidfile.ensure_not_running().unwrap();
    }

    #[test]
    fn write_then_read_current_pid() {
        let dir = TempDir::new().unwrap();
        let pidfile = pidfile(&dir);

        pidfile.write_current().unwrap();
        assert_eq!(pidfile.read_pid().unwrap(), Some(std::process::id() as i32));
    }

    #[test]
    fn live_pid_blocks_start() {
        let dir = TempDir::new().unwrap();
        let pidfile = pidfile(&dir);
        pidfile.write_current().unwrap();

        let err = pidfile.ensure_not_running().unwrap_err();
        assert_eq!(
            err.downcast_ref::<InstanceError>(),
            Some(&InstanceError::AlreadyRunning {
                pid: std::process::id() as i32
            })
        );
        assert!(pidfile.path().exists());
    }

    #[test]
    fn stale_pidfile_is_removed() {
        let dir = TempDir::new().unwrap();
        let pidfile = pidfile(&dir);
        fs::write(pidfile.path(), format!("{DEAD_PID}\n")).unwrap();

        pidfile.ensure_not_running().unwrap();
        assert!(!pidfile.path().exists());
    }

    #[test]
    fn garbage_pidfile_is_removed() {
        let dir = TempDir::new().unwrap();
        let pidfile = pidfile(&dir);
        fs::write(pidfile.path(), "not a pid").unwrap();

        assert!(pidfile.read_pid().is_err());
        pidfile.ensure_not_running().unwrap();
        assert!(!pidfile.path().exists());
    }

    #[test]
    fn non_positive_pid_is_rejected() {
        let dir = TempDir::new().unwrap();
        let pidfile = pidfile(&dir);
        fs::write(pidfile.path(), "0").unwrap();

        assert!(pidfile.read_pid().is_err());
        assert!(!is_process_alive(0));
        assert!(!is_process_alive(-1));
    }

    #[test]
    fn stop_without_pidfile_is_not_running() {
        let dir = TempDir::new().unwrap();
        let pidfile = pidfile(&dir);

        let err = pidfile.stop().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstanceError>(),
            Some(InstanceError::NotRunning { .. })
        ));
    }

    #[test]
    fn stop_with_dead_pid_still_removes_pidfile() {
        let dir = TempDir::new().unwrap();
        let pidfile = pidfile(&dir);
        fs::write(pidfile.path(), DEAD_PID.to_string()).unwrap();

        assert_eq!(pidfile.stop().unwrap(), StopOutcome::AlreadyGone(DEAD_PID));
        assert!(!pidfile.path().exists());
    }

    #[test]
    fn stop_terminates_recorded_process() {
        let dir = TempDir::new().unwrap();
        let pidfile = pidfile(&dir);
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id() as i32;
        fs::write(pidfile.path(), pid.to_string()).unwrap();

        assert_eq!(pidfile.stop().unwrap(), StopOutcome::Signalled(pid));
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
        assert!(!pidfile.path().exists());
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let pidfile = pidfile(&dir);

        pidfile.write_current().unwrap();
        pidfile.remove().unwrap();
        pidfile.remove().unwrap();
    }
}
