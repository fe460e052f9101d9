//! Symlink convergence for a single module.
//!
//! ## Per-module protocol
//!
//! 1. Filter the cached listing down to the module's links.
//! 2. Resolve the desired `<weight>-<module>` name and source target.
//! 3. Keep an existing link only if both name and target match.
//! 4. Otherwise place the desired link: symlink at `.<name>.modrel.tmp`,
//!    then `rename` onto the final name (atomic on POSIX, and replaces a
//!    same-named stale link in one step). A plain file or directory at the
//!    final name is not ours; the module fails instead of replacing it.
//! 5. Remove every other link of the module.
//! 6. Report each mutation to the [`FilesystemSyncGate`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use modrel_core::{ModuleName, ModuleRelease};

use crate::error::{io_err, SyncError};
use crate::gate::{scan_dir, FilesystemSyncGate};
use crate::layout::SourceLayout;
use crate::link::{LinkName, ModuleLink};

// ---------------------------------------------------------------------------
// Link outcome
// ---------------------------------------------------------------------------

/// Outcome of an individual link operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A link was placed (new, renamed, or retargeted).
    Linked { path: PathBuf, target: PathBuf },
    /// A stale link was removed.
    Unlinked { path: PathBuf },
    /// The existing link already matches.
    Unchanged { path: PathBuf },
    /// Dry-run: the link *would* have been placed.
    WouldLink { path: PathBuf, target: PathBuf },
    /// Dry-run: the link *would* have been removed.
    WouldUnlink { path: PathBuf },
}

impl LinkOutcome {
    /// Whether this outcome touched (or would touch) the filesystem.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, LinkOutcome::Unchanged { .. })
    }

    pub fn path(&self) -> &Path {
        match self {
            LinkOutcome::Linked { path, .. }
            | LinkOutcome::Unlinked { path }
            | LinkOutcome::Unchanged { path }
            | LinkOutcome::WouldLink { path, .. }
            | LinkOutcome::WouldUnlink { path } => path,
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Desired link for a module with a selected release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredLink {
    pub name: LinkName,
    pub target: PathBuf,
}

impl DesiredLink {
    pub fn for_release(release: &ModuleRelease, layout: &impl SourceLayout) -> Self {
        Self {
            name: LinkName::for_release(release),
            target: layout.source_dir(release),
        }
    }
}

/// Operations that converge one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPlan {
    pub module: ModuleName,
    /// Link to place, as `(path, target)`.
    pub create: Option<(PathBuf, PathBuf)>,
    /// Existing link that already matches.
    pub keep: Option<PathBuf>,
    /// Stale links to remove.
    pub remove: Vec<PathBuf>,
}

/// Compute the operations that make `existing` match `desired` for `module`.
///
/// `existing` may hold links of other modules; they are ignored.
pub fn plan(
    dir: &Path,
    module: &ModuleName,
    desired: Option<&DesiredLink>,
    existing: &[ModuleLink],
) -> LinkPlan {
    let own: Vec<&ModuleLink> = existing.iter().filter(|l| l.module() == module).collect();

    let Some(desired) = desired else {
        return LinkPlan {
            module: module.clone(),
            create: None,
            keep: None,
            remove: own.iter().map(|l| l.path.clone()).collect(),
        };
    };

    let path = dir.join(desired.name.file_name());
    let matching = own
        .iter()
        .find(|l| l.path == path && l.target == desired.target);

    let (create, keep) = match matching {
        Some(link) => (None, Some(link.path.clone())),
        None => (Some((path.clone(), desired.target.clone())), None),
    };

    // A same-named stale link is replaced by the rename, not removed.
    let remove = own
        .iter()
        .filter(|l| l.path != path)
        .map(|l| l.path.clone())
        .collect();

    LinkPlan {
        module: module.clone(),
        create,
        keep,
        remove,
    }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Carry out `plan`, keeping `gate` in step with what was changed.
///
/// Stops at the first filesystem error. Operations already applied stay
/// applied; the next pass picks up from the resulting state.
pub fn apply(
    plan: &LinkPlan,
    gate: &mut FilesystemSyncGate,
    dry_run: bool,
) -> Result<Vec<LinkOutcome>, SyncError> {
    let mut outcomes = Vec::new();

    if let Some(path) = plan.keep.as_ref() {
        tracing::debug!(module = %plan.module, link = %path.display(), "link unchanged");
        outcomes.push(LinkOutcome::Unchanged { path: path.clone() });
    }

    if let Some((path, target)) = plan.create.as_ref() {
        ensure_replaceable(path)?;
        if dry_run {
            tracing::info!(
                module = %plan.module,
                link = %path.display(),
                target = %target.display(),
                "[dry-run] would link module"
            );
            outcomes.push(LinkOutcome::WouldLink {
                path: path.clone(),
                target: target.clone(),
            });
        } else {
            atomic_link(target, path)?;
            tracing::info!(
                module = %plan.module,
                link = %path.display(),
                target = %target.display(),
                "linked module"
            );
            if let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(LinkName::parse)
            {
                gate.record_linked(ModuleLink {
                    name,
                    path: path.clone(),
                    target: target.clone(),
                });
            }
            outcomes.push(LinkOutcome::Linked {
                path: path.clone(),
                target: target.clone(),
            });
        }
    }

    for path in &plan.remove {
        if dry_run {
            tracing::info!(module = %plan.module, link = %path.display(), "[dry-run] would unlink");
            outcomes.push(LinkOutcome::WouldUnlink { path: path.clone() });
            continue;
        }
        remove_link(path)?;
        gate.record_unlinked(path);
        tracing::info!(module = %plan.module, link = %path.display(), "unlinked stale module link");
        outcomes.push(LinkOutcome::Unlinked { path: path.clone() });
    }

    Ok(outcomes)
}

/// Plan and apply in one step for `module`.
pub fn converge_module(
    gate: &mut FilesystemSyncGate,
    module: &ModuleName,
    desired: Option<&DesiredLink>,
    dry_run: bool,
) -> Result<Vec<LinkOutcome>, SyncError> {
    let dir = gate.dir().to_path_buf();
    let existing = gate.listing()?.to_vec();
    let plan = plan(&dir, module, desired, &existing);
    apply(&plan, gate, dry_run)
}

// ---------------------------------------------------------------------------
// Filesystem primitives
// ---------------------------------------------------------------------------

/// Temporary sibling used while placing `path`.
pub(crate) fn tmp_link_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.modrel.tmp"))
}

/// Point `path` at `target`, replacing any existing link at `path`.
pub(crate) fn atomic_link(target: &Path, path: &Path) -> Result<(), SyncError> {
    atomic_link_with_tmp(target, path, &tmp_link_path(path))
}

fn atomic_link_with_tmp(target: &Path, path: &Path, tmp: &Path) -> Result<(), SyncError> {
    // Left over from an interrupted pass.
    match std::fs::remove_file(tmp) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(tmp, e)),
    }

    make_symlink(target, tmp).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Only a missing entry or a symlink may sit where a link is placed.
fn ensure_replaceable(path: &Path) -> Result<(), SyncError> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Ok(()),
        Ok(_) => Err(io_err(
            path,
            std::io::Error::new(ErrorKind::AlreadyExists, "entry exists and is not a symlink"),
        )),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path, e)),
    }
}

/// Remove a link; one that is already gone counts as removed.
fn remove_link(path: &Path) -> Result<(), SyncError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(link = %path.display(), "link already gone");
            Ok(())
        }
        Err(e) => Err(io_err(path, e)),
    }
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Path of the link currently installed for `module` in `dir`, if any.
///
/// Plain files that happen to follow the naming convention are ignored.
pub fn find_module_link(dir: &Path, module: &ModuleName) -> Result<Option<PathBuf>, SyncError> {
    Ok(scan_dir(dir)?
        .into_iter()
        .find(|l| l.module() == module)
        .map(|l| l.path))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
