use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// pidguard command-line interface
#[derive(Parser, Debug, Clone)]
#[command(name = "pidguard", version, about = "Run a single instance of a process behind a locked pidfile", long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv). `RUST_LOG` overrides this.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Pidfile guarding the instance
    #[arg(short, long, value_name = "PATH")]
    pub pidfile: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Acquire the pidfile and hold it until SIGTERM/SIGINT or until COMMAND exits
    Run {
        /// Also write logs to a daily rolling file in this directory
        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,

        /// Command to run while the pidfile is held
        #[arg(last = true, value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// Exit 0 if the pidfile names a live process, non-zero otherwise
    Status,

    /// Send SIGTERM to the recorded process and wait for it to release the pidfile
    Stop,
}
