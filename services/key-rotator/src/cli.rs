use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "key-rotator")]
#[command(about = "Rotate requests across rate-limited API keys", long_about = None)]
pub struct Cli {
    /// Path to the TOML config file (overrides KEY_ROTATOR_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Append a key to the end of the rotation
    Add {
        key: String,

        /// Daily request limit for this key (daily_quota pools only)
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Show the key the next dispatch would charge
    Current,

    /// Charge the selected key and print it
    Dispatch {
        /// Number of consecutive dispatches
        #[arg(long, default_value_t = 1)]
        count: u32,
    },

    /// Print every key with its counters, in rotation order
    List,

    /// Print pool health
    Status,

    /// Remove a key from the rotation
    Remove { key: String },

    /// Rewrite the snapshot from the current pool state
    Flush,
}
