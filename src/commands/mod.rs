use anyhow::Result;

use crate::{
    app::context::AppContext,
    cli::{Cli, Commands},
};

pub mod run;
pub mod status;
pub mod stop;

/// Unified interface implemented by each subcommand handler.
pub trait Command {
    /// Execute the subcommand.
    ///
    /// # Errors
    /// Returns an error if the command fails.
    fn run(&self, ctx: &AppContext) -> Result<()>;
}

/// Central dispatcher: routes parsed CLI to subcommand handlers.
///
/// # Errors
/// Returns an error if the invoked subcommand fails.
pub fn dispatch(cli: &Cli) -> Result<()> {
    let ctx = AppContext::from_env(cli.pidfile.clone())?;

    match &cli.command {
        Commands::Run { command, .. } => run::RunCommand { command }.run(&ctx),
        Commands::Status => status::StatusCommand.run(&ctx),
        Commands::Stop => stop::StopCommand.run(&ctx),
    }
}
