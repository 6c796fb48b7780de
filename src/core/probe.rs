use nix::{
    sys::signal::{self, Signal},
    unistd::Pid,
};
use tracing::trace;

/// Check whether `pid` names a live process we are allowed to signal.
///
/// Sends the null signal, which performs the existence and permission checks
/// of `kill(2)` without delivering anything. Any failure, including `EPERM`,
/// counts as "not alive". Non-positive pids address process groups rather
/// than a single process and are never considered alive.
#[must_use]
pub fn is_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    match signal::kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(errno) => {
            trace!(pid, %errno, "probe signal failed");
            false
        }
    }
}

/// Send SIGTERM to `pid`.
///
/// # Errors
/// Returns the errno from `kill(2)`, or `EINVAL` for non-positive pids.
pub fn terminate(pid: i32) -> nix::Result<()> {
    if pid <= 0 {
        return Err(nix::errno::Errno::EINVAL);
    }
    signal::kill(Pid::from_raw(pid), Signal::SIGTERM)
}

#[cfg(test)]
mod tests {
    use std::{fs, os::unix::fs::MetadataExt, process::Command};

    use nix::unistd::geteuid;

    use super::*;

    // Pid 1 belongs to another user unless we run as root or inside a
    // container where init runs as us.
    fn unsignalable_pid() -> Option<i32> {
        let init_uid = fs::metadata("/proc/1").ok()?.uid();
        let euid = geteuid();
        (!euid.is_root() && init_uid != euid.as_raw()).then_some(1)
    }

    #[test]
    fn current_process_is_alive() {
        let me = i32::try_from(std::process::id()).expect("pid fits in i32");
        assert!(is_alive(me));
    }

    #[test]
    fn group_addresses_are_never_alive() {
        assert!(!is_alive(0));
        assert!(!is_alive(-1));
    }

    #[test]
    fn reaped_child_is_not_alive() {
        let mut child = Command::new("true").spawn().expect("spawn true");
        let pid = i32::try_from(child.id()).expect("pid fits in i32");
        child.wait().expect("wait");
        assert!(!is_alive(pid));
    }

    #[test]
    fn permission_denied_is_not_alive() {
        let Some(pid) = unsignalable_pid() else {
            return;
        };
        assert_eq!(
            signal::kill(Pid::from_raw(pid), None),
            Err(nix::errno::Errno::EPERM)
        );
        assert!(!is_alive(pid));
    }

    #[test]
    fn pid_beyond_pid_max_is_not_alive() {
        assert!(!is_alive(999_999_999));
    }

    #[test]
    fn terminate_rejects_group_addresses() {
        assert_eq!(terminate(0), Err(nix::errno::Errno::EINVAL));
    }
}
