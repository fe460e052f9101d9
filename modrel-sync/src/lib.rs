//! # modrel-sync
//!
//! Filesystem half of a reconciliation pass: the cached modules-directory
//! listing, per-module symlink convergence, and the pass driver.
//!
//! Call [`Reconciler::run_pass`] with a loaded snapshot; persist the
//! returned [`PassReport::patches`] with `modrel_core::apply_patches`.

pub mod config;
pub mod error;
pub mod gate;
pub mod layout;
pub mod link;
pub mod pipeline;
pub mod symlink;

pub use config::{ModulesConfig, MODULES_DIR_ENV};
pub use error::SyncError;
pub use gate::FilesystemSyncGate;
pub use layout::{SourceLayout, VersionedLayout};
pub use link::{LinkName, ModuleLink};
pub use pipeline::{ModuleReport, PassReport, Reconciler};
pub use symlink::{find_module_link, DesiredLink, LinkOutcome, LinkPlan};
