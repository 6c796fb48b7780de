//! Locked pidfile guarding a single running instance.
//!
//! The exclusive `flock` is the authority: whoever holds it owns the path.
//! The recorded pid is a second check for leftovers from a previous instance
//! and the handle external tools use to signal the owner.

use std::{
    fmt,
    fs::{self, DirBuilder, File, OpenOptions},
    io::{self, Read},
    os::unix::fs::{DirBuilderExt, FileExt as _, OpenOptionsExt},
    path::{Path, PathBuf},
    sync::mpsc::{Receiver, Sender},
};

use fs2::FileExt;
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::{core::probe, error::PidfileError};

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o666;

/// Runs the acquire, wait, release cycle for one pidfile path.
#[derive(Debug, Clone)]
pub struct Runner {
    path: PathBuf,
}

impl Runner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Acquire the pidfile, signal `ready`, block until one value arrives on
    /// `shutdown`, then remove the pidfile and release the lock.
    ///
    /// `ready` is sent exactly once and only after the current pid has been
    /// written. It is never sent when acquisition fails. A closed `shutdown`
    /// channel ends the wait like a received value.
    ///
    /// # Errors
    /// Returns any acquisition error from [`Runner::acquire`] before `ready`
    /// fires, or [`PidfileError::Removal`] if cleanup fails.
    pub fn run<S: fmt::Debug>(
        &self,
        shutdown: &Receiver<S>,
        ready: Sender<()>,
    ) -> Result<(), PidfileError> {
        let held = self.acquire()?;

        // A dropped receiver means the caller stopped listening; the pidfile
        // is recorded regardless.
        let _ = ready.send(());
        drop(ready);

        let (path, pid) = (held.path().display(), held.pid());
        match shutdown.recv() {
            Ok(request) => info!(path = %path, pid, ?request, "shutdown requested"),
            Err(_) => info!(path = %path, pid, "shutdown channel closed"),
        }

        held.release()
    }

    /// Take the lock, reject a live previous owner and record our pid.
    ///
    /// Never blocks: a lock held elsewhere fails immediately with
    /// [`PidfileError::LockContention`].
    ///
    /// # Errors
    /// Returns the [`PidfileError`] of the first step that failed. The handle
    /// is unlocked and closed on every error path.
    pub fn acquire(&self) -> Result<HeldPidfile, PidfileError> {
        let path = self.path.clone();

        prepare_parent(&path)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(FILE_MODE)
            .open(&path)
            .map_err(|source| PidfileError::Open {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "trying pidfile lock");
        if let Err(source) = file.try_lock_exclusive() {
            return Err(PidfileError::LockContention { path, source });
        }

        let mut held = HeldPidfile {
            file,
            path,
            pid: Pid::this().as_raw(),
        };

        if let Some(previous) = held.read_record() {
            if probe::is_alive(previous) {
                // `held` drops here and releases the lock.
                return Err(PidfileError::ProcessExists {
                    path: held.path.clone(),
                    pid: previous,
                });
            }
            warn!(path = %held.path.display(), pid = previous, "replacing stale pidfile");
        }

        held.record()?;
        info!(path = %held.path.display(), pid = held.pid, "pidfile acquired");
        Ok(held)
    }
}

/// An exclusively locked pidfile holding the current pid.
///
/// Dropping it unlocks and closes the handle but leaves the file on disk,
/// the same state a crash leaves behind. Use [`HeldPidfile::release`] for a
/// clean shutdown.
#[derive(Debug)]
pub struct HeldPidfile {
    file: File,
    path: PathBuf,
    pid: i32,
}

impl HeldPidfile {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The pid recorded in the file.
    #[must_use]
    pub const fn pid(&self) -> i32 {
        self.pid
    }

    /// Remove the pidfile while still locked, then unlock and close it.
    ///
    /// # Errors
    /// Returns [`PidfileError::Removal`] if the file cannot be removed. The
    /// lock is released either way.
    pub fn release(self) -> Result<(), PidfileError> {
        let removed = fs::remove_file(&self.path).map_err(|source| PidfileError::Removal {
            path: self.path.clone(),
            source,
        });
        if removed.is_ok() {
            info!(path = %self.path.display(), "pidfile released");
        }
        drop(self);
        removed
    }

    fn read_record(&mut self) -> Option<i32> {
        let mut content = Vec::new();
        if let Err(e) = self.file.read_to_end(&mut content) {
            debug!(path = %self.path.display(), error = %e, "unreadable pidfile treated as empty");
            return None;
        }
        let pid = parse_record(&content);
        debug!(path = %self.path.display(), ?pid, "existing pidfile record");
        pid
    }

    fn record(&self) -> Result<(), PidfileError> {
        write_record(&self.file, self.pid).map_err(|source| PidfileError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for HeldPidfile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// What a pidfile on disk currently says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidfileState {
    Absent,
    /// Nobody holds the lock, or the recorded pid is not alive.
    Stale(Option<i32>),
    /// The lock is held and the recorded pid answers the probe.
    Live(i32),
}

/// Classify the pidfile at `path` without disturbing its owner.
///
/// The lock decides ownership: an unlocked file is a leftover even when its
/// pid now belongs to some unrelated process, so that pid is never probed.
///
/// # Errors
/// Returns read or lock errors other than a missing file or a held lock.
pub fn inspect(path: &Path) -> io::Result<PidfileState> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PidfileState::Absent),
        Err(e) => return Err(e),
    };
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    let pid = parse_record(&content);

    match FileExt::try_lock_shared(&file) {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            debug!(path = %path.display(), ?pid, "pidfile is not locked");
            return Ok(PidfileState::Stale(pid));
        }
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => {}
        Err(e) => return Err(e),
    }

    Ok(match pid {
        Some(pid) if probe::is_alive(pid) => PidfileState::Live(pid),
        pid => PidfileState::Stale(pid),
    })
}

fn prepare_parent(path: &Path) -> Result<(), PidfileError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(parent)
        .map_err(|source| PidfileError::DirectoryCreation {
            path: parent.to_path_buf(),
            source,
        })
}

/// Leading decimal pid of `content`; empty, garbage or non-positive is `None`.
fn parse_record(content: &[u8]) -> Option<i32> {
    let content = content.trim_ascii_start();
    let content = content.strip_prefix(b"+").unwrap_or(content);
    let end = content
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(content.len());
    let digits = std::str::from_utf8(&content[..end]).ok()?;
    let pid: i32 = digits.parse().ok()?;
    (pid > 0).then_some(pid)
}

// Truncate first so a shorter pid leaves no trailing digits behind.
fn write_record(file: &File, pid: i32) -> io::Result<()> {
    file.set_len(0)?;
    file.write_all_at(pid.to_string().as_bytes(), 0)?;
    file.sync_data()
}
