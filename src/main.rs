use anyhow::Result;
use clap::Parser;
use pidguard::cli::{Cli, Commands};
use pidguard::commands::dispatch;
use pidguard::logging::init::{init_tracing, init_tracing_with_file};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // `run --log-dir` adds a rolling log file next to stderr
    match &cli.command {
        Commands::Run {
            log_dir: Some(dir), ..
        } => init_tracing_with_file(dir, cli.verbose)?,
        _ => init_tracing(cli.verbose)?,
    }

    dispatch(&cli)
}
