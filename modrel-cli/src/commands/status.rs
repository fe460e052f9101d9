//! `modrel status` — selection and link state per module, read-only.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use modrel_core::{select_all, snapshot, ModuleName, ReleaseRegistry};
use modrel_sync::{gate::scan_dir, DesiredLink, ModuleLink, ModulesConfig, VersionedLayout};

use super::TargetArgs;

/// Arguments for `modrel status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let path = &self.target.snapshot;
        let snap = snapshot::load_at(path)
            .with_context(|| format!("failed to load snapshot {}", path.display()))?;

        let config = ModulesConfig::new(&self.target.root);
        config
            .ensure_ready()
            .context("modules directory is not usable")?;
        let links = scan_dir(&config.modules_dir()).context("failed to scan modules directory")?;

        let rows = build_rows(&config, &ReleaseRegistry::from_snapshot(&snap), &links);
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(rows);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum ModuleState {
    InSync,
    NeedsPass,
}

#[derive(Debug, Serialize)]
struct ModuleStatus {
    module: String,
    releases: usize,
    rejected: usize,
    selected: Option<String>,
    phase: Option<String>,
    links: Vec<String>,
    state: ModuleState,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "module")]
    module: String,
    #[tabled(rename = "releases")]
    releases: usize,
    #[tabled(rename = "rejected")]
    rejected: usize,
    #[tabled(rename = "selected")]
    selected: String,
    #[tabled(rename = "phase")]
    phase: String,
    #[tabled(rename = "link")]
    link: String,
    #[tabled(rename = "state")]
    state: String,
}

fn build_rows(
    config: &ModulesConfig,
    registry: &ReleaseRegistry,
    links: &[ModuleLink],
) -> Vec<ModuleStatus> {
    let layout = VersionedLayout::new(config.source_root());
    let dir = config.modules_dir();

    let mut by_module = BTreeMap::<ModuleName, Vec<&ModuleLink>>::new();
    for link in links {
        by_module.entry(link.module().clone()).or_default().push(link);
    }
    let rejected_modules = registry.rejected().iter().filter_map(|r| r.module.as_ref());
    for module in registry.modules().chain(rejected_modules) {
        by_module.entry(module.clone()).or_default();
    }

    let decisions: BTreeMap<_, _> = select_all(registry)
        .into_iter()
        .map(|d| (d.module.clone(), d))
        .collect();

    by_module
        .into_iter()
        .map(|(module, links)| {
            let decision = decisions.get(&module);
            let selected = decision.and_then(|d| d.selected.as_ref());
            let pending = decision.is_some_and(|d| !d.supersede.is_empty())
                || selected.is_some_and(|r| !r.is_deployed());
            let linked = match selected {
                Some(release) => {
                    let want = DesiredLink::for_release(release, &layout);
                    let path = dir.join(want.name.file_name());
                    links.len() == 1 && links[0].path == path && links[0].target == want.target
                }
                None => links.is_empty(),
            };
            let state = if linked && !pending {
                ModuleState::InSync
            } else {
                ModuleState::NeedsPass
            };
            ModuleStatus {
                releases: registry.group(&module).map_or(0, |g| g.len()),
                rejected: registry
                    .rejected()
                    .iter()
                    .filter(|r| r.module.as_ref() == Some(&module))
                    .count(),
                selected: selected.map(|r| r.name.to_string()),
                phase: selected.map(|r| r.phase.to_string()),
                links: links.iter().map(|l| l.name.file_name()).collect(),
                state,
                module: module.to_string(),
            }
        })
        .collect()
}

fn print_table(rows: Vec<ModuleStatus>) {
    let pending = rows
        .iter()
        .filter(|r| r.state == ModuleState::NeedsPass)
        .count();
    println!(
        "modrel v{} | {} modules | {} need a pass",
        env!("CARGO_PKG_VERSION"),
        rows.len(),
        pending,
    );

    if rows.is_empty() {
        println!("No modules in snapshot or on disk.");
        return;
    }

    let table_rows: Vec<StatusTableRow> = rows
        .into_iter()
        .map(|row| StatusTableRow {
            module: row.module,
            releases: row.releases,
            rejected: row.rejected,
            selected: row.selected.unwrap_or_else(|| "-".to_string()),
            phase: row.phase.unwrap_or_else(|| "-".to_string()),
            link: if row.links.is_empty() {
                "-".to_string()
            } else {
                row.links.join(", ")
            },
            state: state_label(row.state),
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    if pending > 0 {
        println!("Run 'modrel reconcile' to converge.");
    }
}

fn state_label(state: ModuleState) -> String {
    match state {
        ModuleState::InSync => "IN SYNC".green().bold().to_string(),
        ModuleState::NeedsPass => "NEEDS PASS".yellow().bold().to_string(),
    }
}
