//! Scan-once cache of the modules directory.
//!
//! The first call to [`FilesystemSyncGate::listing`] reads the directory;
//! later calls reuse the cached listing until [`FilesystemSyncGate::invalidate`]
//! is called. The reconciler reports its own mutations through
//! [`record_linked`](FilesystemSyncGate::record_linked) and
//! [`record_unlinked`](FilesystemSyncGate::record_unlinked) so the cache stays
//! accurate without rescanning.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};
use crate::link::{LinkName, ModuleLink};

#[derive(Debug)]
pub struct FilesystemSyncGate {
    dir: PathBuf,
    listing: Option<Vec<ModuleLink>>,
    scans: usize,
}

impl FilesystemSyncGate {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            listing: None,
            scans: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached listing, scanning the directory if nothing is cached.
    pub fn listing(&mut self) -> Result<&[ModuleLink], SyncError> {
        if self.listing.is_none() {
            let links = scan_dir(&self.dir)?;
            self.scans += 1;
            tracing::debug!(
                dir = %self.dir.display(),
                links = links.len(),
                "scanned modules directory"
            );
            self.listing = Some(links);
        } else {
            tracing::debug!(dir = %self.dir.display(), "reusing cached modules listing");
        }
        Ok(self.listing.as_deref().unwrap_or_default())
    }

    /// Drop the cached listing; the next [`listing`](Self::listing) rescans.
    pub fn invalidate(&mut self) {
        if self.listing.take().is_some() {
            tracing::debug!(dir = %self.dir.display(), "modules listing invalidated");
        }
    }

    pub fn is_synchronized(&self) -> bool {
        self.listing.is_some()
    }

    /// Number of directory scans performed by this gate.
    pub fn scans(&self) -> usize {
        self.scans
    }

    /// A link was placed at `link.path`, replacing whatever was cached there.
    pub fn record_linked(&mut self, link: ModuleLink) {
        if let Some(listing) = self.listing.as_mut() {
            listing.retain(|l| l.path != link.path);
            listing.push(link);
            listing.sort_by(|a, b| a.path.cmp(&b.path));
        }
    }

    pub fn record_unlinked(&mut self, path: &Path) {
        if let Some(listing) = self.listing.as_mut() {
            listing.retain(|l| l.path != path);
        }
    }
}

/// Read every module link in `dir`, sorted by path.
///
/// Only symbolic links whose names follow the `<weight>-<module>` convention
/// are returned; plain files and directories are ignored even when their
/// names match.
pub fn scan_dir(dir: &Path) -> Result<Vec<ModuleLink>, SyncError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(SyncError::ModulesDirMissing {
                path: dir.to_path_buf(),
            })
        }
        Err(err) => return Err(io_err(dir, err)),
    };

    let mut links = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
        if !file_type.is_symlink() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().and_then(LinkName::parse) else {
            continue;
        };
        let target = match std::fs::read_link(&path) {
            Ok(target) => target,
            // Removed between read_dir and read_link.
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(io_err(&path, err)),
        };
        links.push(ModuleLink { name, path, target });
    }
    links.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(links)
}
