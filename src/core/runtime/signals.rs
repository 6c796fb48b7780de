use std::{sync::mpsc::Sender, thread};

use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use tokio::signal::unix::{SignalKind, signal};
use tracing::debug;

use super::Event;

/// Forward SIGTERM and SIGINT into `tx` as [`Event::Signal`].
///
/// Handlers are installed before this returns, so from then on those signals
/// no longer terminate the process. Forwarding runs on a dedicated thread
/// with its own current-thread Tokio runtime and stops once `tx` is closed.
///
/// # Errors
/// Returns an error if the runtime, the handlers or the thread cannot be set
/// up.
pub fn forward_termination(tx: Sender<Event>) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let (mut term, mut int) = {
        let _enter = rt.enter();
        (
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?,
            signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?,
        )
    };

    thread::Builder::new()
        .name("pidguard-signals".into())
        .spawn(move || {
            rt.block_on(async move {
                loop {
                    let sig = tokio::select! {
                        Some(()) = term.recv() => Signal::SIGTERM,
                        Some(()) = int.recv() => Signal::SIGINT,
                        else => break,
                    };
                    debug!(signal = ?sig, "received termination signal");
                    if tx.send(Event::Signal(sig)).is_err() {
                        break;
                    }
                }
            });
        })
        .context("failed to spawn signal thread")?;

    Ok(())
}
