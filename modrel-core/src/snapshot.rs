//! Snapshot files: multi-document YAML streams of release manifests.
//!
//! # Format
//!
//! ```text
//! ---
//! apiVersion: deckhouse.io/v1alpha1
//! kind: ExternalModuleRelease
//! metadata: { name: echoserver-v0.0.1 }
//! spec: { moduleName: echoserver, version: 0.0.1 }
//! status: { phase: Pending }
//! ---
//! ...
//! ```
//!
//! Empty documents are skipped, so an empty file is an empty snapshot.
//! A document that is valid YAML but not a release manifest is kept as a
//! [`MalformedDocument`]: it is reported as a rejection and written back
//! unchanged.
//! Saving uses the same `.tmp` sibling + `rename` flow as every other write
//! in the workspace.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ReleaseError;
use crate::types::{ReleaseManifest, ReleaseName};

/// A document that parsed as YAML but not as a release manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedDocument {
    /// 1-based position in the stream, counting skipped empty documents.
    pub document: usize,
    /// Number of releases that precede it, for write-back ordering.
    pub position: usize,
    pub value: serde_yaml::Value,
    pub reason: String,
}

/// An ordered set of release manifests.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub releases: Vec<ReleaseManifest>,
    pub malformed: Vec<MalformedDocument>,
}

impl Snapshot {
    pub fn from_manifests(releases: Vec<ReleaseManifest>) -> Self {
        Self {
            releases,
            malformed: Vec::new(),
        }
    }

    /// Parse a YAML stream.
    ///
    /// Only broken YAML fails the parse. Documents of the wrong shape end up
    /// in [`Snapshot::malformed`].
    pub fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
        let mut snapshot = Self::default();
        for (index, document) in serde_yaml::Deserializer::from_str(contents).enumerate() {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            match serde_yaml::from_value::<ReleaseManifest>(value.clone()) {
                Ok(manifest) => snapshot.releases.push(manifest),
                Err(err) => snapshot.malformed.push(MalformedDocument {
                    document: index + 1,
                    position: snapshot.releases.len(),
                    value,
                    reason: err.to_string(),
                }),
            }
        }
        Ok(snapshot)
    }

    /// Render as a YAML stream, one document per release. Malformed
    /// documents are emitted where they were read.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let mut out = String::new();
        let mut malformed = self.malformed.iter().peekable();
        for (i, manifest) in self.releases.iter().enumerate() {
            while let Some(doc) = malformed.next_if(|d| d.position <= i) {
                out.push_str("---\n");
                out.push_str(&serde_yaml::to_string(&doc.value)?);
            }
            out.push_str("---\n");
            out.push_str(&serde_yaml::to_string(manifest)?);
        }
        for doc in malformed {
            out.push_str("---\n");
            out.push_str(&serde_yaml::to_string(&doc.value)?);
        }
        Ok(out)
    }

    pub fn find(&self, name: &ReleaseName) -> Option<&ReleaseManifest> {
        self.releases.iter().find(|m| m.metadata.name == name.0)
    }

    pub fn find_mut(&mut self, name: &ReleaseName) -> Option<&mut ReleaseManifest> {
        self.releases.iter_mut().find(|m| m.metadata.name == name.0)
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load a snapshot file.
///
/// Returns `ReleaseError::SnapshotNotFound` if absent and
/// `ReleaseError::Parse` (with path + line context) if malformed.
pub fn load_at(path: &Path) -> Result<Snapshot, ReleaseError> {
    if !path.exists() {
        return Err(ReleaseError::SnapshotNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    Snapshot::parse(&contents).map_err(|source| ReleaseError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Save (atomic)
// ---------------------------------------------------------------------------

/// `<path>.tmp`, always in the same directory as the target.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically save a snapshot: serialize → `.tmp` sibling → `rename`.
pub fn save_at(path: &Path, snapshot: &Snapshot) -> Result<(), ReleaseError> {
    let yaml = snapshot.to_yaml()?;
    let tmp = tmp_path_for(path);
    std::fs::write(&tmp, yaml)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
