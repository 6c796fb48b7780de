//! Single-instance execution control through a locked pidfile.
//!
//! [`Runner`] takes an exclusive `flock` on a pidfile, refuses to start while
//! the recorded pid belongs to a live process, writes the current pid,
//! signals readiness and holds the file until told to shut down. The
//! `pidguard` binary wires OS termination signals into that cycle.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;

pub use crate::core::pidfile::{HeldPidfile, PidfileState, Runner};
pub use crate::error::PidfileError;
