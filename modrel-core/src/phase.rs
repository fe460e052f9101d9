//! Release phase state machine and status patch planning.
//!
//! ```text
//! Pending ──▶ Deployed ──▶ Superseded
//! ```
//!
//! Those two arrows are the only moves. Self-transitions are accepted as
//! no-ops so planning never emits a patch that changes nothing.

use serde::Serialize;

use crate::error::{ReleaseError, TransitionError};
use crate::registry::ReleaseRegistry;
use crate::selector::ModuleDecision;
use crate::snapshot::Snapshot;
use crate::types::{ModuleName, Phase, ReleaseName};

impl Phase {
    pub fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Pending, Phase::Deployed) | (Phase::Deployed, Phase::Superseded)
        ) || self == next
    }

    /// Checked move to `next`.
    pub fn transition(self, release: &ReleaseName, next: Phase) -> Result<Phase, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                release: release.clone(),
                from: self,
                to: next,
            })
        }
    }
}

/// A phase change for the persistence collaborator to write back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPatch {
    pub release_name: ReleaseName,
    #[serde(skip)]
    pub module: ModuleName,
    #[serde(skip)]
    pub from: Phase,
    pub phase: Phase,
}

/// Compute the patches that bring recorded phases in line with `decisions`.
///
/// Every release a decision names must be present in `registry`; a missing
/// one is reported as [`ReleaseError::UnknownRelease`].
pub fn plan_patches(
    registry: &ReleaseRegistry,
    decisions: &[ModuleDecision],
) -> Result<Vec<StatusPatch>, ReleaseError> {
    let mut patches = Vec::new();

    for decision in decisions {
        if let Some(selected) = decision.selected.as_ref() {
            if let Some(patch) = patch_for(registry, &selected.name, Phase::Deployed)? {
                patches.push(patch);
            }
        }
        for name in &decision.supersede {
            if let Some(patch) = patch_for(registry, name, Phase::Superseded)? {
                patches.push(patch);
            }
        }
    }

    Ok(patches)
}

fn patch_for(
    registry: &ReleaseRegistry,
    name: &ReleaseName,
    next: Phase,
) -> Result<Option<StatusPatch>, ReleaseError> {
    let release = registry
        .get(name)
        .ok_or_else(|| ReleaseError::UnknownRelease {
            release: name.clone(),
        })?;
    if release.phase == next {
        return Ok(None);
    }
    let phase = release.phase.transition(name, next)?;
    Ok(Some(StatusPatch {
        release_name: name.clone(),
        module: release.module.clone(),
        from: release.phase,
        phase,
    }))
}

/// Apply `patches` to the manifests in `snapshot`.
///
/// Returns the number of patches that changed a recorded phase. The snapshot
/// is left partially patched if an error is returned.
pub fn apply_patches(
    snapshot: &mut Snapshot,
    patches: &[StatusPatch],
) -> Result<usize, ReleaseError> {
    let mut changed = 0;
    for patch in patches {
        let manifest =
            snapshot
                .find_mut(&patch.release_name)
                .ok_or_else(|| ReleaseError::UnknownRelease {
                    release: patch.release_name.clone(),
                })?;
        let current = manifest.phase();
        let next = current.transition(&patch.release_name, patch.phase)?;
        if next != current {
            manifest.set_phase(next);
            changed += 1;
        }
    }
    Ok(changed)
}
