//! modrel — external module release reconciler.
//!
//! # Usage
//!
//! ```text
//! modrel reconcile --snapshot <file> [--root <dir>] [--dry-run] [--write-status] [--json]
//! modrel status --snapshot <file> [--root <dir>] [--json]
//! ```
//!
//! `--root` falls back to `EXTERNAL_MODULES_DIR`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{reconcile::ReconcileArgs, status::StatusArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "modrel",
    version,
    about = "Converge external module releases and their on-disk links",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one reconciliation pass over a release snapshot.
    Reconcile(ReconcileArgs),

    /// Show the selected release and current link of every module.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Reconcile(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
