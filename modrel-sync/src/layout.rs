//! Where a release's extracted sources live.
//!
//! Extraction itself belongs to another component; the reconciler only needs
//! to resolve the directory a link should point at.

use std::path::PathBuf;

use modrel_core::ModuleRelease;

pub trait SourceLayout {
    fn source_dir(&self, release: &ModuleRelease) -> PathBuf;
}

/// `<root>/<moduleName>/v<version>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedLayout {
    root: PathBuf,
}

impl VersionedLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceLayout for VersionedLayout {
    fn source_dir(&self, release: &ModuleRelease) -> PathBuf {
        self.root
            .join(release.module.as_str())
            .join(format!("v{}", release.version))
    }
}

impl<L: SourceLayout + ?Sized> SourceLayout for &L {
    fn source_dir(&self, release: &ModuleRelease) -> PathBuf {
        (**self).source_dir(release)
    }
}
