use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sunrise_clockd: alarm clock daemon with a sunrise light
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file path (default: first of $SUNRISE_CLOCKD_CONFIG,
    /// ~/.config/sunrise_clockd/config.yml, /etc/sunrise_clockd/config.yml)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Stay in the foreground instead of daemonizing
    #[arg(long = "foreground", global = true, default_value_t = false)]
    pub foreground: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the daemon
    Start,
    /// Stop the running daemon
    Stop,
}
