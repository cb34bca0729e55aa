use clap::{Parser, Subcommand};

/// Checkpoint: RFID vehicle pass validator
#[derive(Parser)]
#[command(name = "checkpoint", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the scan server
    Serve {
        /// Port to bind (defaults to CHECKPOINT_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate a tag against the database and print the outcome.
    /// Nothing is written to the scan log.
    Check {
        #[arg(long)]
        tag_id: String,
    },

    /// Apply database migrations and exit
    Migrate,
}
