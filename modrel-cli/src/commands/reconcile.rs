//! `modrel reconcile` — one pass over a snapshot.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use modrel_core::{apply_patches, snapshot, StatusPatch};
use modrel_sync::{LinkOutcome, ModuleReport, ModulesConfig, PassReport, Reconciler};

use super::TargetArgs;

/// Arguments for `modrel reconcile`.
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Report what would change without touching the modules directory.
    #[arg(long)]
    pub dry_run: bool,

    /// Write the resulting phases back into the snapshot file.
    #[arg(long, conflicts_with = "dry_run")]
    pub write_status: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ReconcileArgs {
    pub fn run(self) -> Result<()> {
        let path = &self.target.snapshot;
        let mut snap = snapshot::load_at(path)
            .with_context(|| format!("failed to load snapshot {}", path.display()))?;

        let mut reconciler = Reconciler::new(ModulesConfig::new(&self.target.root));
        let report = reconciler
            .run_pass(&snap, self.dry_run)
            .context("reconciliation pass failed")?;

        let mut written = 0;
        if self.write_status && !report.patches.is_empty() {
            written = apply_patches(&mut snap, &report.patches)
                .context("failed to apply status patches")?;
            snapshot::save_at(path, &snap)
                .with_context(|| format!("failed to write snapshot {}", path.display()))?;
            tracing::info!(path = %path.display(), phases = written, "status written back");
        }

        if self.json {
            print_json(&report)?;
        } else {
            print_results(&report, self.dry_run, written);
        }

        let failed = report.failures().count();
        if failed > 0 {
            bail!("{failed} module(s) did not converge");
        }
        Ok(())
    }
}

fn print_results(report: &PassReport, dry_run: bool, written: usize) {
    let prefix = if dry_run { "[dry-run] " } else { "" };

    for rejection in &report.rejected {
        let release = rejection
            .release
            .as_ref()
            .map(|r| r.as_str())
            .unwrap_or("<unnamed>");
        println!("  !  rejected '{release}': {}", rejection.error);
    }

    if report.is_converged() {
        println!("{prefix}✓ nothing to do");
        return;
    }

    for module in &report.modules {
        print_module(module);
    }

    for patch in &report.patches {
        println!(
            "  →  {}: {} → {}",
            patch.release_name, patch.from, patch.phase
        );
    }

    println!(
        "{prefix}✓ {} modules, {} link changes, {} phase changes",
        report.modules.len(),
        report.mutations(),
        report.patches.len()
    );
    if written > 0 {
        println!("  ✎  {written} phases written back");
    }
}

fn print_module(module: &ModuleReport) {
    let outcomes = match &module.outcome {
        Ok(outcomes) => outcomes,
        Err(err) => {
            println!("  ✗  '{}': {err}", module.module);
            return;
        }
    };
    for outcome in outcomes {
        match outcome {
            LinkOutcome::Linked { path, target } => {
                println!("  +  {} → {}", path.display(), target.display())
            }
            LinkOutcome::WouldLink { path, target } => {
                println!("  ~  {} → {}", path.display(), target.display())
            }
            LinkOutcome::Unlinked { path } => println!("  -  {}", path.display()),
            LinkOutcome::WouldUnlink { path } => println!("  ~- {}", path.display()),
            LinkOutcome::Unchanged { path } => println!("  ·  {}", path.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PassJson<'a> {
    patches: &'a [StatusPatch],
    modules: Vec<ModuleJson>,
    rejected: Vec<RejectionJson>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModuleJson {
    module: String,
    selected: Option<String>,
    ok: bool,
    error: Option<String>,
    operations: Vec<OperationJson>,
}

#[derive(Serialize)]
struct OperationJson {
    op: &'static str,
    path: String,
    target: Option<String>,
}

#[derive(Serialize)]
struct RejectionJson {
    release: Option<String>,
    module: Option<String>,
    error: String,
}

fn print_json(report: &PassReport) -> Result<()> {
    let payload = PassJson {
        patches: &report.patches,
        modules: report.modules.iter().map(module_json).collect(),
        rejected: report
            .rejected
            .iter()
            .map(|r| RejectionJson {
                release: r.release.as_ref().map(|n| n.to_string()),
                module: r.module.as_ref().map(|m| m.to_string()),
                error: r.error.to_string(),
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize pass JSON")?
    );
    Ok(())
}

fn module_json(module: &ModuleReport) -> ModuleJson {
    let (operations, error): (Vec<OperationJson>, Option<String>) = match &module.outcome {
        Ok(outcomes) => (outcomes.iter().map(operation_json).collect(), None),
        Err(err) => (Vec::new(), Some(err.to_string())),
    };
    ModuleJson {
        module: module.module.to_string(),
        selected: module.selected.as_ref().map(|n| n.to_string()),
        ok: error.is_none(),
        error,
        operations,
    }
}

fn operation_json(outcome: &LinkOutcome) -> OperationJson {
    let (op, target) = match outcome {
        LinkOutcome::Linked { target, .. } => ("link", Some(target)),
        LinkOutcome::WouldLink { target, .. } => ("would_link", Some(target)),
        LinkOutcome::Unlinked { .. } => ("unlink", None),
        LinkOutcome::WouldUnlink { .. } => ("would_unlink", None),
        LinkOutcome::Unchanged { .. } => ("unchanged", None),
    };
    OperationJson {
        op,
        path: outcome.path().display().to_string(),
        target: target.map(|t| t.display().to_string()),
    }
}

