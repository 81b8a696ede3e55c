//! Command-line surface: `serve` runs the HTTP/WS shell only, `run`
//! drives the order-flow generator for a bounded number of seconds
//! (optionally serving the WS feed concurrently).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "exchange-sim")]
#[command(version, about = "Synthetic equity exchange simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the read-only snapshot and L3 WebSocket feed; the driver
    /// runs in the background for as long as the process is alive.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// JSON file of `SimConfig` overrides; omitted fields keep defaults.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Drive the order-flow generator for `seconds` seconds (0 = until
    /// `num_days` completes or the process is interrupted).
    Run {
        #[arg(long, default_value_t = 0)]
        seconds: u64,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Also serve the HTTP/WS shell while the driver runs.
        #[arg(long)]
        serve: bool,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}
