use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::ReportPeriod;

/// Track YouTube channel subscriber growth and report fast-growing channels.
#[derive(Parser)]
#[command(name = "subtrack", version, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Poll subscriber counts for every tracked channel
    Update,

    /// Archive and remove channels that stopped growing
    Clean,

    /// Generate a growth report and mail the summary
    Report {
        #[arg(long = "type", value_enum, default_value_t = ReportPeriod::Weekly)]
        period: ReportPeriod,

        /// Lookback window in days (defaults to the period's window)
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        days: Option<i64>,
    },

    /// Discover channels through the configured search keywords
    Collect {
        /// Scan country growth charts instead (no codes: the configured list)
        #[arg(long, value_name = "COUNTRY", num_args = 0.., value_delimiter = ',')]
        leaderboard: Option<Vec<String>>,
    },

    /// Refresh the short-form flag from recent upload durations
    Classify,

    /// Load a legacy channel table and/or history directory
    Import {
        #[arg(long)]
        channels: Option<PathBuf>,

        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// List tracked channels
    List {
        /// Show the inactive archive instead
        #[arg(long)]
        archived: bool,
    },

    /// Stop tracking a channel and drop its history
    Remove { channel_id: String },
}
