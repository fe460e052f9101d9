//! In-memory projection of a snapshot, grouped by module.
//!
//! Building a [`ReleaseRegistry`] never fails: manifests that do not
//! validate are kept aside as [`Rejection`]s so the caller can report them.
//! A rejected release takes no part in selection; the valid releases of the
//! same module still do.

use std::collections::{BTreeMap, HashMap};

use crate::error::ValidationError;
use crate::snapshot::{MalformedDocument, Snapshot};
use crate::types::{ModuleName, ModuleRelease, ReleaseManifest, ReleaseName};

/// A manifest that was refused during ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// `metadata.name`, when the manifest had one.
    pub release: Option<ReleaseName>,
    /// `spec.moduleName`, when it was present (even if otherwise invalid).
    pub module: Option<ModuleName>,
    pub error: ValidationError,
}

/// Releases of one snapshot grouped by module name.
#[derive(Debug, Clone, Default)]
pub struct ReleaseRegistry {
    groups: BTreeMap<ModuleName, Vec<ModuleRelease>>,
    index: HashMap<ReleaseName, ModuleName>,
    rejected: Vec<Rejection>,
}

impl ReleaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and group every manifest in `manifests`.
    pub fn from_manifests<'a>(manifests: impl IntoIterator<Item = &'a ReleaseManifest>) -> Self {
        let mut registry = Self::new();
        for manifest in manifests {
            registry.ingest(manifest);
        }
        registry
    }

    /// Validate every manifest of `snapshot` and reject its malformed
    /// documents.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut registry = Self::from_manifests(&snapshot.releases);
        for doc in &snapshot.malformed {
            registry.reject_malformed(doc);
        }
        registry
    }

    fn reject_malformed(&mut self, doc: &MalformedDocument) {
        let field = |section: &str, key: &str| {
            doc.value
                .get(section)
                .and_then(|v| v.get(key))
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        self.rejected.push(Rejection {
            release: field("metadata", "name").map(ReleaseName::from),
            module: field("spec", "moduleName").map(ModuleName::from),
            error: ValidationError::MalformedDocument {
                document: doc.document,
                reason: doc.reason.clone(),
            },
        });
    }

    fn ingest(&mut self, manifest: &ReleaseManifest) {
        let result = ModuleRelease::try_from(manifest).and_then(|r| self.insert(r));
        if let Err(error) = result {
            let name = manifest.metadata.name.as_str();
            self.rejected.push(Rejection {
                release: (!name.is_empty()).then(|| ReleaseName::from(name)),
                module: manifest
                    .spec
                    .module_name
                    .as_deref()
                    .filter(|m| !m.is_empty())
                    .map(ModuleName::from),
                error,
            });
        }
    }

    /// Add one release to its module group.
    pub fn insert(&mut self, release: ModuleRelease) -> Result<(), ValidationError> {
        if self.index.contains_key(&release.name) {
            return Err(ValidationError::DuplicateRelease {
                release: release.name.0,
            });
        }
        self.index.insert(release.name.clone(), release.module.clone());
        self.groups
            .entry(release.module.clone())
            .or_default()
            .push(release);
        Ok(())
    }

    /// Module groups in module-name order.
    pub fn groups(&self) -> impl Iterator<Item = (&ModuleName, &[ModuleRelease])> {
        self.groups.iter().map(|(m, rs)| (m, rs.as_slice()))
    }

    pub fn group(&self, module: &ModuleName) -> Option<&[ModuleRelease]> {
        self.groups.get(module).map(Vec::as_slice)
    }

    pub fn get(&self, name: &ReleaseName) -> Option<&ModuleRelease> {
        let module = self.index.get(name)?;
        self.groups.get(module)?.iter().find(|r| &r.name == name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleName> {
        self.groups.keys()
    }

    pub fn rejected(&self) -> &[Rejection] {
        &self.rejected
    }

    /// Number of accepted releases.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;

    #[test]
    fn empty_input_gives_empty_registry() {
        let registry = ReleaseRegistry::from_manifests(std::iter::empty());
        assert!(registry.is_empty());
        assert_eq!(registry.groups().count(), 0);
        assert!(registry.rejected().is_empty());
    }

    #[test]
    fn releases_group_by_module() {
        let manifests = vec![
            ReleaseManifest::new("echo-v0.0.1", "echo", "0.0.1").with_phase(Phase::Deployed),
            ReleaseManifest::new("echo-v0.0.2", "echo", "0.0.2"),
            ReleaseManifest::new("cert-v1.0.0", "cert", "1.0.0"),
        ];
        let registry = ReleaseRegistry::from_manifests(&manifests);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.group(&ModuleName::from("echo")).map(<[_]>::len), Some(2));
        assert_eq!(registry.group(&ModuleName::from("cert")).map(<[_]>::len), Some(1));
        let order: Vec<_> = registry.modules().map(ModuleName::as_str).collect();
        assert_eq!(order, ["cert", "echo"]);
    }

    #[test]
    fn missing_module_name_is_rejected_not_skipped() {
        let mut bad = ReleaseManifest::new("orphan-v1.0.0", "orphan", "1.0.0");
        bad.spec.module_name = None;
        let registry = ReleaseRegistry::from_manifests(&[bad]);

        assert!(registry.is_empty());
        assert_eq!(registry.rejected().len(), 1);
        let rejection = &registry.rejected()[0];
        assert_eq!(rejection.release, Some(ReleaseName::from("orphan-v1.0.0")));
        assert!(matches!(
            rejection.error,
            ValidationError::MissingModuleName { .. }
        ));
    }

    #[test]
    fn bad_version_drops_only_that_release() {
        let manifests = vec![
            ReleaseManifest::new("echo-v0.0.1", "echo", "0.0.1"),
            ReleaseManifest::new("echo-vbroken", "echo", "broken"),
            ReleaseManifest::new("cert-v1.0.0", "cert", "1.0.0"),
        ];
        let registry = ReleaseRegistry::from_manifests(&manifests);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.group(&ModuleName::from("echo")).map(<[_]>::len), Some(1));
        assert_eq!(registry.rejected().len(), 1);
        assert_eq!(registry.rejected()[0].module, Some(ModuleName::from("echo")));
    }

    #[test]
    fn malformed_documents_become_rejections() {
        let yaml = "metadata:\n  name: echo-bad\nspec:\n  moduleName: echo\n  weight: -1\n---\nmetadata:\n  name: echo-v0.0.1\nspec:\n  moduleName: echo\n  version: 0.0.1\n";
        let snapshot = Snapshot::parse(yaml).expect("parse");
        let registry = ReleaseRegistry::from_snapshot(&snapshot);

        assert_eq!(registry.len(), 1);
        let rejection = &registry.rejected()[0];
        assert_eq!(rejection.release, Some(ReleaseName::from("echo-bad")));
        assert_eq!(rejection.module, Some(ModuleName::from("echo")));
        assert!(matches!(
            rejection.error,
            ValidationError::MalformedDocument { document: 1, .. }
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let manifests = vec![
            ReleaseManifest::new("echo-v0.0.1", "echo", "0.0.1"),
            ReleaseManifest::new("echo-v0.0.1", "echo", "0.0.1"),
        ];
        let registry = ReleaseRegistry::from_manifests(&manifests);
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.rejected()[0].error,
            ValidationError::DuplicateRelease { .. }
        ));
    }

    #[test]
    fn get_finds_release_by_name() {
        let manifests = vec![ReleaseManifest::new("echo-v0.0.1", "echo", "0.0.1").with_weight(987)];
        let registry = ReleaseRegistry::from_manifests(&manifests);
        let release = registry.get(&ReleaseName::from("echo-v0.0.1")).expect("present");
        assert_eq!(release.weight.0, 987);
        assert!(registry.get(&ReleaseName::from("nope")).is_none());
    }
}
