//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Courier - multi-account message dispatch
#[derive(Parser)]
#[command(
    name = "courier",
    about = "Concurrent multi-account message dispatch with rate-limit handling",
    version,
    after_help = "Logs are written to: ~/.local/share/courier/logs/courier.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Broadcast a message to every account's group list
    Broadcast {
        /// Message text to send
        message: String,

        /// YAML file mapping session name to its group targets
        #[arg(short, long, value_name = "FILE")]
        targets: PathBuf,

        /// Full passes over each account's target list
        #[arg(short, long, default_value = "1")]
        rounds: u32,

        /// Seconds between rounds
        #[arg(long, default_value = "200")]
        round_delay: u64,

        /// Seconds between account task starts
        #[arg(long, default_value = "10")]
        account_stagger: u64,
    },

    /// Message a list of users, each user at most once per round
    Direct {
        /// Message text to send
        message: String,

        /// File with one user handle per line
        #[arg(short, long, value_name = "FILE")]
        users: PathBuf,

        /// Rounds to run
        #[arg(short, long, default_value = "1")]
        rounds: u32,

        /// Seconds between rounds
        #[arg(long, default_value = "300")]
        round_delay: u64,

        /// Seconds between consecutive sends across the whole job
        #[arg(long, default_value = "5")]
        stagger: u64,
    },

    /// Join every account into a list of chats
    Join {
        /// File with one group link or id per line
        #[arg(short, long, value_name = "FILE")]
        links: PathBuf,
    },

    /// Scan and connect sessions, then report account status
    Accounts {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for status commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Path to the log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("courier")
        .join("logs")
        .join("courier.log")
}
