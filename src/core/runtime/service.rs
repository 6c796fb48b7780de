use std::{
    os::unix::process::ExitStatusExt,
    path::Path,
    process::{Command, ExitStatus},
    sync::{
        Arc, Mutex,
        mpsc::{self, Sender},
    },
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result, anyhow};
use nix::{
    sys::wait::{Id, WaitPidFlag, waitid},
    unistd::Pid,
};
use tracing::{debug, error, info, warn};

use super::{Event, signals};
use crate::{
    core::{pidfile::Runner, probe},
    error::PidfileError,
};

/// Hold `pidfile` for the lifetime of this process or of `command`.
///
/// With an empty `command`, blocks until SIGTERM or SIGINT arrives. Otherwise
/// `command` is started once the pidfile is recorded; termination signals
/// are passed on to it as SIGTERM, and its exit ends the run.
///
/// Returns the exit code the caller should exit with: 0 when holding without
/// a command, the child's code otherwise (128 + signal number if it was
/// killed by a signal).
///
/// # Errors
/// Returns an error if the pidfile cannot be acquired or the command cannot
/// be started. Failing to remove the pidfile at the end is only logged.
pub fn run_guarded(pidfile: &Path, command: &[String]) -> Result<i32> {
    let (event_tx, event_rx) = mpsc::channel();
    signals::forward_termination(event_tx.clone())?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<Event>();
    let (ready_tx, ready_rx) = mpsc::channel();
    let runner = Runner::new(pidfile);
    let holder = thread::Builder::new()
        .name("pidguard-holder".into())
        .spawn(move || runner.run(&shutdown_rx, ready_tx))
        .context("failed to spawn pidfile thread")?;

    if ready_rx.recv().is_err() {
        // The runner gave up before recording our pid.
        return match holder.join() {
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(())) => Err(anyhow!("pidfile runner exited before becoming ready")),
            Err(_) => Err(anyhow!("pidfile thread panicked")),
        };
    }
    info!(path = %pidfile.display(), pid = std::process::id(), "ready");

    let child = match command.split_first() {
        None => None,
        Some((program, args)) => match spawn_child(program, args, event_tx) {
            Ok(child) => Some(child),
            Err(e) => {
                let _ = shutdown_tx.send(Event::ChildExited(None));
                finish(holder);
                return Err(e);
            }
        },
    };

    let (last, code) = loop {
        let Ok(event) = event_rx.recv() else {
            break (Event::ChildExited(None), 1);
        };
        match (event, &child) {
            (Event::Signal(sig), Some(child)) => {
                info!(signal = ?sig, pid = child.pid, "passing termination on to child");
                child.terminate();
            }
            (Event::Signal(_), None) => break (event, 0),
            (Event::ChildExited(status), _) => break (event, status.map_or(1, exit_code)),
        }
    };

    let _ = shutdown_tx.send(last);
    finish(holder);
    Ok(code)
}

/// A child started by [`spawn_child`], watched by its waiter thread.
struct GuardedChild {
    pid: i32,
    // Set once the child has exited; the waiter reaps it only afterwards.
    exited: Arc<Mutex<bool>>,
}

impl GuardedChild {
    /// Send SIGTERM unless the child already exited. Returns whether it was sent.
    ///
    /// Holding the lock keeps the waiter from reaping the child, so the pid
    /// cannot be handed to another process while we signal it.
    fn terminate(&self) -> bool {
        let Ok(exited) = self.exited.lock() else {
            return false;
        };
        if *exited {
            debug!(pid = self.pid, "child already exited; not signalling");
            return false;
        }
        if let Err(errno) = probe::terminate(self.pid) {
            warn!(pid = self.pid, %errno, "failed to signal child");
        }
        true
    }
}

fn spawn_child(program: &str, args: &[String], events: Sender<Event>) -> Result<GuardedChild> {
    let mut child = Command::new(program)
        .args(args)
        .spawn()
        .with_context(|| format!("failed to start {program}"))?;
    let pid = i32::try_from(child.id()).context("child pid out of range")?;
    info!(program, pid, "started child");

    let exited = Arc::new(Mutex::new(false));
    let waiter_exited = Arc::clone(&exited);
    thread::Builder::new()
        .name("pidguard-child".into())
        .spawn(move || {
            // Leave the child a zombie until `exited` is set.
            let flags = WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT;
            if let Err(errno) = waitid(Id::Pid(Pid::from_raw(pid)), flags) {
                warn!(pid, %errno, "failed to wait for child exit");
            }
            if let Ok(mut exited) = waiter_exited.lock() {
                *exited = true;
            }
            let status = match child.wait() {
                Ok(status) => Some(status),
                Err(e) => {
                    error!(pid, error = %e, "failed to wait for child");
                    None
                }
            };
            let _ = events.send(Event::ChildExited(status));
        })
        .context("failed to spawn child waiter")?;

    Ok(GuardedChild { pid, exited })
}

fn finish(holder: JoinHandle<Result<(), PidfileError>>) {
    match holder.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("pidfile cleanup failed: {:#}", anyhow::Error::from(e)),
        Err(_) => error!("pidfile thread panicked"),
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn wait_exit(rx: &mpsc::Receiver<Event>) -> Option<ExitStatus> {
        match rx.recv_timeout(Duration::from_secs(5)).expect("child exit") {
            Event::ChildExited(status) => status,
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn exited_child_is_not_signalled() {
        let (tx, rx) = mpsc::channel();
        let child = spawn_child("true", &[], tx).expect("spawn true");

        let status = wait_exit(&rx).expect("status");
        assert!(status.success());
        assert!(!child.terminate());
    }

    #[test]
    fn running_child_is_terminated() {
        let (tx, rx) = mpsc::channel();
        let child = spawn_child("sleep", &["30".to_string()], tx).expect("spawn sleep");

        assert!(child.terminate());
        let status = wait_exit(&rx).expect("status");
        assert_eq!(status.signal(), Some(15));
    }

    #[test]
    fn exit_code_maps_signals() {
        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
        // Raw wait status of a process killed by SIGTERM.
        assert_eq!(exit_code(ExitStatus::from_raw(15)), 143);
    }
}
