use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "taxibot")]
#[command(author, version, about = "Multi-driver order dispatch for the taxi and delivery bots", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the driver bot (default)
    Run,

    /// Broadcast one order to all drivers and wait until it is resolved
    Broadcast {
        /// Order id, must be positive
        #[arg(long)]
        order_id: i64,

        /// Order payload as a JSON object, e.g. '{"client_id": 42, "pickup_address": "..."}'
        #[arg(long)]
        payload: String,
    },

    /// List orders still waiting for a driver, with the responses so far
    Pending,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
