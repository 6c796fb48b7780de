use anyhow::Result;

use super::Command;
use crate::app::context::AppContext;

pub struct StatusCommand;

impl Command for StatusCommand {
    fn run(&self, ctx: &AppContext) -> Result<()> {
        if let Some(pid) = crate::core::runtime::process::status(&ctx.pidfile)? {
            println!("running (pid={pid})");
            std::process::exit(0);
        } else {
            println!("stopped");
            std::process::exit(1);
        }
    }
}
