//! Satchel - cookie session demo server
//!
//! Main entry point for the satchel CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod routes;

use commands::serve;

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Satchel - cookie session demo server
#[derive(Parser)]
#[command(name = "satchel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the demo server
    Serve(serve::ServeArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "satchel=debug,satchel_session=trace,satchel_server=debug,tower_http=debug,info"
    } else {
        "satchel=info,satchel_session=info,satchel_server=info,warn"
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let ctx = commands::Context {
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
    }
}
