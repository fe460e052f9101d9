//! Error types for modrel-sync.

use std::path::PathBuf;

use thiserror::Error;

use modrel_core::ReleaseError;

/// All errors that can arise while converging the module directory.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Snapshot handling or status planning failed.
    #[error("release error: {0}")]
    Release(#[from] ReleaseError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The `modules` subdirectory has to exist before the first pass.
    #[error("modules directory {path} does not exist")]
    ModulesDirMissing { path: PathBuf },

    #[error("{path} is not a directory")]
    NotADirectory { path: PathBuf },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
