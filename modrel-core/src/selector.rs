//! Active release selection.
//!
//! For each module the selector decides which single release must be
//! `Deployed`:
//!
//! 1. `Superseded` releases are never candidates.
//! 2. An already `Deployed` release stays selected unless a candidate with a
//!    strictly higher version exists.
//! 3. Otherwise the candidate with the highest version wins; equal versions
//!    fall back to the lexically greatest release name.
//! 4. Every other `Deployed` release is marked for supersession.

use std::cmp::Ordering;

use crate::registry::ReleaseRegistry;
use crate::types::{ModuleName, ModuleRelease, Phase, ReleaseName};

/// Desired state for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecision {
    pub module: ModuleName,
    /// Release that must be `Deployed`; `None` means the module's link goes.
    pub selected: Option<ModuleRelease>,
    /// Currently `Deployed` releases that lost selection.
    pub supersede: Vec<ReleaseName>,
}

/// Select the active release of every module in `registry`.
///
/// Rejected releases never reach the registry groups, so they are not
/// candidates.
pub fn select_all(registry: &ReleaseRegistry) -> Vec<ModuleDecision> {
    registry
        .groups()
        .map(|(module, releases)| select(module, releases))
        .collect()
}

/// Select the active release among `releases` of `module`.
pub fn select(module: &ModuleName, releases: &[ModuleRelease]) -> ModuleDecision {
    let candidates: Vec<&ModuleRelease> = releases
        .iter()
        .filter(|r| r.phase != Phase::Superseded)
        .collect();

    let incumbent = candidates
        .iter()
        .copied()
        .filter(|r| r.is_deployed())
        .max_by(|a, b| rank(a, b));
    let best = candidates.iter().copied().max_by(|a, b| rank(a, b));

    let selected = match (incumbent, best) {
        (Some(current), Some(best)) if best.version <= current.version => Some(current),
        (_, best) => best,
    };

    let supersede = releases
        .iter()
        .filter(|r| r.is_deployed())
        .filter(|r| selected.map_or(true, |s| s.name != r.name))
        .map(|r| r.name.clone())
        .collect();

    ModuleDecision {
        module: module.clone(),
        selected: selected.cloned(),
        supersede,
    }
}

/// Total order used for selection: version first, release name second.
fn rank(a: &ModuleRelease, b: &ModuleRelease) -> Ordering {
    a.version
        .cmp(&b.version)
        .then_with(|| a.name.cmp(&b.name))
}
