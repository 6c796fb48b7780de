use std::{path::Path, thread, time::Instant};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
    config::GuardConfig,
    core::{
        pidfile::{self, PidfileState},
        probe,
    },
};

/// Result of asking a running instance to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    /// SIGTERM was sent and the pidfile was removed in time.
    Stopped(i32),
    /// SIGTERM was sent but the pidfile was still present at the deadline.
    StillRunning(i32),
}

/// Pid of the live process recorded in `pidfile`, if any.
///
/// # Errors
/// Returns an error if the pidfile exists but cannot be read.
pub fn status(pidfile: &Path) -> Result<Option<i32>> {
    let state = pidfile::inspect(pidfile)
        .with_context(|| format!("failed to read {}", pidfile.display()))?;
    debug!(path = %pidfile.display(), ?state, "pidfile state");
    Ok(match state {
        PidfileState::Live(pid) => Some(pid),
        PidfileState::Absent | PidfileState::Stale(_) => None,
    })
}

/// Send SIGTERM to the recorded process and wait for its pidfile to go away.
///
/// # Errors
/// Returns an error if the pidfile cannot be read or the signal cannot be
/// sent.
pub fn stop(pidfile: &Path, cfg: &GuardConfig) -> Result<StopOutcome> {
    let Some(pid) = status(pidfile)? else {
        return Ok(StopOutcome::NotRunning);
    };

    probe::terminate(pid).with_context(|| format!("failed to send SIGTERM to {pid}"))?;
    info!(pid, "sent SIGTERM");

    let deadline = Instant::now() + cfg.stop_timeout();
    loop {
        if !pidfile.exists() {
            return Ok(StopOutcome::Stopped(pid));
        }
        if Instant::now() >= deadline {
            return Ok(StopOutcome::StillRunning(pid));
        }
        thread::sleep(cfg.poll_interval());
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, process::Command};

    use super::*;
    use crate::core::pidfile::Runner;

    #[test]
    fn missing_pidfile_is_not_running() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("svc.pid");

        assert_eq!(status(&path).expect("status"), None);
        assert_eq!(
            stop(&path, &GuardConfig::default()).expect("stop"),
            StopOutcome::NotRunning
        );
    }

    #[test]
    fn stale_pidfile_is_not_running() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("svc.pid");
        fs::write(&path, "999999999").expect("seed");

        assert_eq!(status(&path).expect("status"), None);
        assert_eq!(
            stop(&path, &GuardConfig::default()).expect("stop"),
            StopOutcome::NotRunning
        );
        // A stale record is left for the next owner to overwrite.
        assert!(path.exists());
    }

    #[test]
    fn held_pidfile_reports_pid() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("svc.pid");
        let held = Runner::new(&path).acquire().expect("acquire");

        assert_eq!(status(&path).expect("status"), Some(held.pid()));
        held.release().expect("release");
        assert_eq!(status(&path).expect("status"), None);
    }

    #[test]
    fn unlocked_leftover_never_signals_recorded_pid() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("svc.pid");

        // A crash left the file behind and its pid now names a bystander.
        let mut bystander = Command::new("sleep").arg("30").spawn().expect("spawn sleep");
        fs::write(&path, bystander.id().to_string()).expect("seed");

        let cfg = GuardConfig {
            stop_timeout_ms: 200,
            poll_interval_ms: 50,
        };
        assert_eq!(status(&path).expect("status"), None);
        assert_eq!(stop(&path, &cfg).expect("stop"), StopOutcome::NotRunning);

        let untouched = bystander.try_wait().expect("try_wait").is_none();
        let _ = bystander.kill();
        let _ = bystander.wait();
        assert!(untouched, "stop signalled a process that does not hold the lock");
    }
}
