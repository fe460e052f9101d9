//! modrel core library: release domain types, snapshot I/O, and the pure
//! half of a reconciliation pass.
//!
//! - [`types`] — newtypes, manifests and validated releases
//! - [`error`] — [`ReleaseError`], [`ValidationError`], [`TransitionError`]
//! - [`snapshot`] — load / save / parse YAML snapshots
//! - [`registry`] — group releases by module
//! - [`selector`] — pick the active release per module
//! - [`phase`] — phase state machine and status patches

pub mod error;
pub mod phase;
pub mod registry;
pub mod selector;
pub mod snapshot;
pub mod types;

pub use error::{ReleaseError, TransitionError, ValidationError};
pub use phase::{apply_patches, plan_patches, StatusPatch};
pub use registry::{Rejection, ReleaseRegistry};
pub use selector::{select, select_all, ModuleDecision};
pub use snapshot::{MalformedDocument, Snapshot};
pub use types::{
    ModuleName, ModuleRelease, Phase, ReleaseManifest, ReleaseName, Weight, DEFAULT_WEIGHT,
};
