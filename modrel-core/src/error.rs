//! Error types for modrel-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{Phase, ReleaseName};

/// A release object that cannot take part in selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("release has no metadata.name")]
    MissingName,

    #[error("release {release} has no spec.moduleName")]
    MissingModuleName { release: String },

    #[error("release {release} has invalid spec.moduleName {module_name:?}: {reason}")]
    InvalidModuleName {
        release: String,
        module_name: String,
        reason: &'static str,
    },

    #[error("release {release} has no spec.version")]
    MissingVersion { release: String },

    #[error("release {release} has unparsable version {version:?}: {reason}")]
    InvalidVersion {
        release: String,
        version: String,
        reason: String,
    },

    #[error("release {release} appears more than once in the snapshot")]
    DuplicateRelease { release: String },

    #[error("snapshot document {document} is not a release manifest: {reason}")]
    MalformedDocument { document: usize, reason: String },
}

/// A phase move the release state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("release {release}: illegal phase transition {from} -> {to}")]
pub struct TransitionError {
    pub release: ReleaseName,
    pub from: Phase,
    pub to: Phase,
}

/// All errors that can arise from snapshot handling and status planning.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse snapshot at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("snapshot not found at {path}")]
    SnapshotNotFound { path: PathBuf },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A status patch names a release that is not in the snapshot. This is a
    /// caller bug, never a data problem.
    #[error("internal error: status patch for release {release} which is absent from the snapshot")]
    UnknownRelease { release: ReleaseName },
}

