//! ingress-trafikverket: Trafikverket → NGSI-LD context broker sync.
//!
//! # Usage
//!
//! ```text
//! ingress-trafikverket run [--config <yaml>]
//! ingress-trafikverket once --stream weather|road-accidents|city-works [--cursor <id>]
//! ingress-trafikverket status [--stream <name>]
//! ```
//!
//! `run` stops on SIGINT or SIGTERM.
//!
//! `run` and `once` read `TFV_API_AUTH_KEY`, `TFV_API_URL` and
//! `CONTEXT_BROKER_URL` from the environment unless given as flags.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{once::OnceArgs, run::RunArgs, status::StatusArgs, GlobalArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ingress-trafikverket",
    version,
    about = "Sync Trafikverket and Sundsvall traffic changes into an NGSI-LD context broker",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll every enabled stream until stopped.
    Run(RunArgs),

    /// Run a single sync cycle of one stream and print its report.
    Once(OnceArgs),

    /// Print the status file written by the daemon.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(&cli.global),
        Commands::Once(args) => args.run(&cli.global),
        Commands::Status(args) => args.run(&cli.global),
    }
}
