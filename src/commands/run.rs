use anyhow::Result;

use super::Command;
use crate::{app::context::AppContext, logging::init::flush_logs};

pub struct RunCommand<'a> {
    pub command: &'a [String],
}

impl Command for RunCommand<'_> {
    fn run(&self, ctx: &AppContext) -> Result<()> {
        let code = crate::core::runtime::service::run_guarded(&ctx.pidfile, self.command)?;
        if code != 0 {
            flush_logs();
            std::process::exit(code);
        }
        Ok(())
    }
}
