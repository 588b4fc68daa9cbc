//! CLI definitions for feedtap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// feedtap CLI.
#[derive(Parser)]
#[command(name = "feedtap")]
#[command(about = "Remote-browser feed extraction and live media capture")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "feedtap.toml", global = true, env = "FEEDTAP_CONFIG")]
    pub config: PathBuf,

    /// Chrome remote debugging endpoint, overriding the configuration
    #[arg(short, long, global = true, env = "FEEDTAP_ENDPOINT")]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Start a session and read commands from the console (default)
    Run,

    /// Print the effective configuration
    Config,
}
