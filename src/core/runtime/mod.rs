use std::process::ExitStatus;

use nix::sys::signal::Signal;

pub mod process;
pub mod service;
pub mod signals;

/// Something that ends a guarded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A termination signal delivered to this process.
    Signal(Signal),
    /// The supervised child exited; `None` if waiting on it failed.
    ChildExited(Option<ExitStatus>),
}
