//! One reconciliation pass, shared by the CLI commands.
//!
//! ## Pass protocol
//!
//! 1. Check that `<root>/modules` exists.
//! 2. Build the [`ReleaseRegistry`] from the snapshot; rejected manifests
//!    are reported and left out of selection.
//! 3. Select the active release per module and plan status patches.
//! 4. Converge each module's links against the gate's cached listing.
//!    Modules that only exist on disk lose their links.
//! 5. Return the patches of every module whose links converged.
//!
//! A failure in steps 1-3 aborts the pass. A filesystem failure in step 4
//! only affects its module: it is reported, its patches are withheld, and
//! the gate is invalidated so the next pass rescans.

use std::collections::{BTreeMap, BTreeSet};

use modrel_core::{
    plan_patches, select_all, ModuleName, Rejection, ReleaseName, ReleaseRegistry, Snapshot,
    StatusPatch,
};

use crate::config::ModulesConfig;
use crate::error::SyncError;
use crate::gate::FilesystemSyncGate;
use crate::layout::{SourceLayout, VersionedLayout};
use crate::symlink::{self, DesiredLink, LinkOutcome};

/// What happened to one module during a pass.
#[derive(Debug)]
pub struct ModuleReport {
    pub module: ModuleName,
    /// Release whose link should be installed, if any.
    pub selected: Option<ReleaseName>,
    pub outcome: Result<Vec<LinkOutcome>, SyncError>,
}

impl ModuleReport {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn mutations(&self) -> usize {
        match &self.outcome {
            Ok(outcomes) => outcomes.iter().filter(|o| o.is_mutation()).count(),
            Err(_) => 0,
        }
    }
}

/// Result of [`Reconciler::run_pass`].
#[derive(Debug, Default)]
pub struct PassReport {
    /// Phase changes for the caller to persist.
    pub patches: Vec<StatusPatch>,
    pub modules: Vec<ModuleReport>,
    pub rejected: Vec<Rejection>,
}

impl PassReport {
    /// Filesystem operations performed (or planned, in dry-run).
    pub fn mutations(&self) -> usize {
        self.modules.iter().map(ModuleReport::mutations).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ModuleName, &SyncError)> {
        self.modules
            .iter()
            .filter_map(|m| m.outcome.as_ref().err().map(|e| (&m.module, e)))
    }

    /// Nothing left to do: no patches, no link changes, no failures.
    pub fn is_converged(&self) -> bool {
        self.patches.is_empty() && self.mutations() == 0 && self.failures().next().is_none()
    }

    pub fn module(&self, module: &ModuleName) -> Option<&ModuleReport> {
        self.modules.iter().find(|m| &m.module == module)
    }
}

/// Drives passes over one modules root, keeping the directory listing cached
/// between them.
#[derive(Debug)]
pub struct Reconciler<L = VersionedLayout> {
    config: ModulesConfig,
    layout: L,
    gate: FilesystemSyncGate,
}

impl Reconciler<VersionedLayout> {
    /// Sources are resolved as `<root>/<module>/v<version>`.
    pub fn new(config: ModulesConfig) -> Self {
        let layout = VersionedLayout::new(config.source_root());
        Self::with_layout(config, layout)
    }
}

impl<L: SourceLayout> Reconciler<L> {
    pub fn with_layout(config: ModulesConfig, layout: L) -> Self {
        let gate = FilesystemSyncGate::new(config.modules_dir());
        Self {
            config,
            layout,
            gate,
        }
    }

    pub fn gate(&self) -> &FilesystemSyncGate {
        &self.gate
    }

    /// Forget the cached listing; the next pass rescans the directory.
    pub fn invalidate(&mut self) {
        self.gate.invalidate();
    }

    /// Run one pass over `snapshot`.
    ///
    /// With `dry_run` nothing on disk changes and the gate cache is left as
    /// it was scanned.
    pub fn run_pass(&mut self, snapshot: &Snapshot, dry_run: bool) -> Result<PassReport, SyncError> {
        self.config.ensure_ready()?;

        let registry = ReleaseRegistry::from_snapshot(snapshot);
        for rejection in registry.rejected() {
            tracing::warn!(
                release = rejection.release.as_ref().map(|r| r.as_str()).unwrap_or("<unnamed>"),
                module = rejection.module.as_ref().map(|m| m.as_str()).unwrap_or("<unknown>"),
                error = %rejection.error,
                "rejected release manifest"
            );
        }
        let decisions = select_all(&registry);
        let patches = plan_patches(&registry, &decisions)?;

        let existing = self.gate.listing()?.to_vec();

        let mut desired: BTreeMap<ModuleName, Option<(ReleaseName, DesiredLink)>> = decisions
            .iter()
            .map(|d| {
                let link = d
                    .selected
                    .as_ref()
                    .map(|r| (r.name.clone(), DesiredLink::for_release(r, &self.layout)));
                (d.module.clone(), link)
            })
            .collect();
        for link in &existing {
            desired.entry(link.module().clone()).or_insert(None);
        }

        let dir = self.gate.dir().to_path_buf();
        let mut modules = Vec::with_capacity(desired.len());
        for (module, want) in desired {
            let selected = want.as_ref().map(|(name, _)| name.clone());
            let plan = symlink::plan(&dir, &module, want.as_ref().map(|(_, l)| l), &existing);
            let outcome = symlink::apply(&plan, &mut self.gate, dry_run);
            if let Err(err) = &outcome {
                tracing::warn!(module = %module, error = %err, "module links did not converge");
                self.gate.invalidate();
            }
            modules.push(ModuleReport {
                module,
                selected,
                outcome,
            });
        }

        let failed: BTreeSet<&ModuleName> = modules
            .iter()
            .filter(|m| !m.is_ok())
            .map(|m| &m.module)
            .collect();
        let patches: Vec<StatusPatch> = patches
            .into_iter()
            .filter(|p| !failed.contains(&p.module))
            .collect();

        let report = PassReport {
            patches,
            modules,
            rejected: registry.rejected().to_vec(),
        };
        tracing::info!(
            modules = report.modules.len(),
            patches = report.patches.len(),
            mutations = report.mutations(),
            rejected = report.rejected.len(),
            dry_run,
            "reconciliation pass finished"
        );
        Ok(report)
    }
}
