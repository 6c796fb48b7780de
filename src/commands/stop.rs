use anyhow::Result;

use super::Command;
use crate::{app::context::AppContext, core::runtime::process::StopOutcome};

pub struct StopCommand;

impl Command for StopCommand {
    fn run(&self, ctx: &AppContext) -> Result<()> {
        match crate::core::runtime::process::stop(&ctx.pidfile, &ctx.cfg)? {
            StopOutcome::NotRunning => println!("stopped"),
            StopOutcome::Stopped(pid) => println!("stopped (pid={pid})"),
            StopOutcome::StillRunning(pid) => {
                eprintln!(
                    "sent SIGTERM to {pid} but {} is still present after {}ms",
                    ctx.pidfile.display(),
                    ctx.cfg.stop_timeout_ms
                );
                std::process::exit(1);
            }
        }
        Ok(())
    }
}
