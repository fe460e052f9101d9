pub mod reconcile;
pub mod status;

use std::path::PathBuf;

use clap::Args;
use modrel_sync::MODULES_DIR_ENV;

/// Snapshot and modules root shared by every subcommand.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Multi-document YAML file of release manifests.
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Root holding the `modules` directory and extracted sources.
    #[arg(long, env = MODULES_DIR_ENV)]
    pub root: PathBuf,
}
