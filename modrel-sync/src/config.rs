//! Location of the modules root and its `modules` directory.

use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};

/// Environment variable naming the external modules root.
pub const MODULES_DIR_ENV: &str = "EXTERNAL_MODULES_DIR";

/// Subdirectory of the root that holds the ordered module links.
pub const MODULES_SUBDIR: &str = "modules";

/// Location of the module tree on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulesConfig {
    pub root: PathBuf,
}

impl ModulesConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<root>/modules`
    pub fn modules_dir(&self) -> PathBuf {
        modules_dir(&self.root)
    }

    /// Root under which release sources are extracted.
    pub fn source_root(&self) -> &Path {
        &self.root
    }

    /// Check that `<root>/modules` exists and is a directory. It is never
    /// created here.
    pub fn ensure_ready(&self) -> Result<(), SyncError> {
        let dir = self.modules_dir();
        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(SyncError::NotADirectory { path: dir }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(SyncError::ModulesDirMissing { path: dir })
            }
            Err(err) => Err(io_err(dir, err)),
        }
    }
}

pub fn modules_dir(root: &Path) -> PathBuf {
    root.join(MODULES_SUBDIR)
}
