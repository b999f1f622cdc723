//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Read text aloud, sentence by sentence.
#[derive(Parser)]
#[command(name = "narrate")]
#[command(about = "Read text aloud with gapless sentence streaming")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// TOML file overriding engine tuning (queue size, buffering, timeouts)
    #[arg(long, global = true, env = "NARRATE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
