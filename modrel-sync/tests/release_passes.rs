#![cfg(unix)]

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use modrel_core::{apply_patches, ModuleName, Phase, ReleaseManifest, ReleaseName, Snapshot};
use modrel_sync::{find_module_link, ModulesConfig, PassReport, Reconciler, SyncError};
use tempfile::TempDir;

fn setup() -> (TempDir, Reconciler) {
    let root = TempDir::new().expect("root");
    fs::create_dir(root.path().join("modules")).expect("create modules dir");
    let reconciler = Reconciler::new(ModulesConfig::new(root.path()));
    (root, reconciler)
}

/// Run a pass and write its patches back, the way the controller does.
fn converge(reconciler: &mut Reconciler, snapshot: &mut Snapshot) -> PassReport {
    let report = reconciler.run_pass(snapshot, false).expect("pass");
    apply_patches(snapshot, &report.patches).expect("apply patches");
    report
}

fn entries(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root.join("modules"))
        .expect("read modules dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn phase(snapshot: &Snapshot, name: &str) -> Phase {
    snapshot
        .find(&ReleaseName::from(name))
        .expect("release present")
        .phase()
}

fn link_target(root: &Path, file_name: &str) -> PathBuf {
    fs::read_link(root.join("modules").join(file_name)).expect("read link")
}

#[test]
fn pending_release_is_deployed_with_default_weight() {
    let (root, mut reconciler) = setup();
    let mut snapshot = Snapshot::from_manifests(vec![ReleaseManifest::new(
        "echoserver-v0.0.1",
        "echoserver",
        "0.0.1",
    )]);

    converge(&mut reconciler, &mut snapshot);

    assert_eq!(phase(&snapshot, "echoserver-v0.0.1"), Phase::Deployed);
    assert_eq!(entries(root.path()), ["900-echoserver"]);
    assert_eq!(
        link_target(root.path(), "900-echoserver"),
        root.path().join("echoserver").join("v0.0.1")
    );
}

#[test]
fn custom_weight_names_the_link() {
    let (root, mut reconciler) = setup();
    let mut snapshot = Snapshot::from_manifests(vec![ReleaseManifest::new(
        "echoserver-v0.0.1",
        "echoserver",
        "0.0.1",
    )
    .with_weight(987)]);

    converge(&mut reconciler, &mut snapshot);
    assert_eq!(entries(root.path()), ["987-echoserver"]);
}

#[test]
fn upgrade_supersedes_previous_release_and_moves_link() {
    let (root, mut reconciler) = setup();
    let mut snapshot = Snapshot::from_manifests(vec![ReleaseManifest::new(
        "m-v1.0.0", "m", "1.0.0",
    )
    .with_weight(987)]);
    converge(&mut reconciler, &mut snapshot);
    assert_eq!(entries(root.path()), ["987-m"]);

    snapshot
        .releases
        .push(ReleaseManifest::new("m-v2.0.0", "m", "2.0.0").with_weight(913));
    let report = converge(&mut reconciler, &mut snapshot);

    assert_eq!(report.patches.len(), 2);
    assert_eq!(phase(&snapshot, "m-v1.0.0"), Phase::Superseded);
    assert_eq!(phase(&snapshot, "m-v2.0.0"), Phase::Deployed);
    assert_eq!(entries(root.path()), ["913-m"]);
    assert_eq!(
        link_target(root.path(), "913-m"),
        root.path().join("m").join("v2.0.0")
    );
}

#[test]
fn removed_release_loses_its_link() {
    let (root, mut reconciler) = setup();
    let mut snapshot = Snapshot::from_manifests(vec![ReleaseManifest::new(
        "echoserver-v0.0.1",
        "echoserver",
        "0.0.1",
    )]);
    converge(&mut reconciler, &mut snapshot);
    assert_eq!(entries(root.path()).len(), 1);

    let mut cleared = Snapshot::default();
    let report = converge(&mut reconciler, &mut cleared);

    assert!(report.patches.is_empty());
    assert!(entries(root.path()).is_empty());
}

#[test]
fn second_pass_is_a_noop() {
    let (root, mut reconciler) = setup();
    let mut snapshot = Snapshot::from_manifests(vec![
        ReleaseManifest::new("echoserver-v0.0.1", "echoserver", "0.0.1"),
        ReleaseManifest::new("parca-v1.2.0", "parca", "1.2.0").with_weight(910),
    ]);
    converge(&mut reconciler, &mut snapshot);
    let before = entries(root.path());

    let report = converge(&mut reconciler, &mut snapshot);
    assert!(report.is_converged(), "unexpected work: {report:?}");
    assert_eq!(entries(root.path()), before);
}

#[test]
fn fresh_reconciler_sees_converged_state() {
    let (root, mut reconciler) = setup();
    let mut snapshot = Snapshot::from_manifests(vec![ReleaseManifest::new(
        "echoserver-v0.0.1",
        "echoserver",
        "0.0.1",
    )]);
    converge(&mut reconciler, &mut snapshot);

    let mut restarted = Reconciler::new(ModulesConfig::new(root.path()));
    let report = converge(&mut restarted, &mut snapshot);
    assert!(report.is_converged());
}

#[test]
fn stale_duplicate_links_are_removed() {
    let (root, mut reconciler) = setup();
    let modules = root.path().join("modules");
    symlink("/old/echoserver", modules.join("100-echoserver")).expect("symlink");
    symlink("/old/echoserver", modules.join("0900-echoserver")).expect("symlink");
    let mut snapshot = Snapshot::from_manifests(vec![ReleaseManifest::new(
        "echoserver-v0.0.1",
        "echoserver",
        "0.0.1",
    )]);

    converge(&mut reconciler, &mut snapshot);
    assert_eq!(entries(root.path()), ["900-echoserver"]);
}

#[test]
fn find_module_link_skips_plain_files() {
    let (root, _reconciler) = setup();
    let modules = root.path().join("modules");
    let target = TempDir::new().expect("target");
    for name in ["100-module1", "200-module2", "300-module3"] {
        symlink(target.path(), modules.join(name)).expect("symlink");
    }
    fs::write(modules.join("333-module2"), "plain file").expect("write");

    let found = find_module_link(&modules, &ModuleName::from("module2"))
        .expect("find")
        .expect("link present");
    assert_eq!(found, modules.join("200-module2"));
    assert!(find_module_link(&modules, &ModuleName::from("module5"))
        .expect("find")
        .is_none());
}

#[test]
fn plain_file_does_not_block_linking() {
    let (root, mut reconciler) = setup();
    fs::write(root.path().join("modules").join("333-echoserver"), "x").expect("write");
    let mut snapshot = Snapshot::from_manifests(vec![ReleaseManifest::new(
        "echoserver-v0.0.1",
        "echoserver",
        "0.0.1",
    )]);

    converge(&mut reconciler, &mut snapshot);
    assert_eq!(entries(root.path()), ["333-echoserver", "900-echoserver"]);
}

#[test]
fn rejected_release_does_not_block_its_siblings() {
    let (root, mut reconciler) = setup();
    let mut snapshot = Snapshot::from_manifests(vec![
        ReleaseManifest::new("echo-v0.0.1", "echo", "0.0.1"),
        ReleaseManifest::new("echo-bad", "echo", "garbage"),
    ]);

    let report = converge(&mut reconciler, &mut snapshot);

    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].release, Some(ReleaseName::from("echo-bad")));
    assert_eq!(phase(&snapshot, "echo-v0.0.1"), Phase::Deployed);
    assert_eq!(phase(&snapshot, "echo-bad"), Phase::Pending);
    assert_eq!(entries(root.path()), ["900-echo"]);
    let echo = report.module(&ModuleName::from("echo")).expect("echo reported");
    assert_eq!(echo.selected, Some(ReleaseName::from("echo-v0.0.1")));
}

#[test]
fn malformed_document_does_not_abort_the_pass() {
    let (root, mut reconciler) = setup();
    let yaml = "\
metadata:
  name: echo-bad
spec:
  moduleName: echo
  version: 0.0.2
  weight: -1
---
metadata:
  name: echo-v0.0.1
spec:
  moduleName: echo
  version: 0.0.1
---
metadata:
  name: other-v1.0.0
spec:
  moduleName: other
  version: 1.0.0
status:
  phase: Bogus
";
    let mut snapshot = Snapshot::parse(yaml).expect("parse");

    let report = converge(&mut reconciler, &mut snapshot);

    assert_eq!(report.rejected.len(), 2);
    assert_eq!(phase(&snapshot, "echo-v0.0.1"), Phase::Deployed);
    assert_eq!(entries(root.path()), ["900-echo"]);
}

#[test]
fn plain_file_at_desired_name_fails_only_its_module() {
    let (root, mut reconciler) = setup();
    let modules = root.path().join("modules");
    fs::write(modules.join("900-echoserver"), "operator data").expect("write");
    let mut snapshot = Snapshot::from_manifests(vec![
        ReleaseManifest::new("echoserver-v0.0.1", "echoserver", "0.0.1"),
        ReleaseManifest::new("other-v1.0.0", "other", "1.0.0"),
    ]);

    let report = converge(&mut reconciler, &mut snapshot);

    let failures: Vec<_> = report.failures().map(|(m, _)| m.clone()).collect();
    assert_eq!(failures, [ModuleName::from("echoserver")]);
    assert_eq!(phase(&snapshot, "echoserver-v0.0.1"), Phase::Pending);
    assert_eq!(phase(&snapshot, "other-v1.0.0"), Phase::Deployed);
    let meta = fs::symlink_metadata(modules.join("900-echoserver")).expect("stat");
    assert!(!meta.file_type().is_symlink());
    assert_eq!(
        fs::read_to_string(modules.join("900-echoserver")).expect("read"),
        "operator data"
    );
}

#[test]
fn filesystem_failure_is_isolated_to_its_module() {
    let (root, mut reconciler) = setup();
    // A real directory where the link has to go.
    let blocker = root.path().join("modules").join("900-broken");
    fs::create_dir(&blocker).expect("mkdir");
    fs::write(blocker.join("keep"), "x").expect("write");
    let mut snapshot = Snapshot::from_manifests(vec![
        ReleaseManifest::new("broken-v1.0.0", "broken", "1.0.0"),
        ReleaseManifest::new("echoserver-v0.0.1", "echoserver", "0.0.1"),
    ]);

    let report = converge(&mut reconciler, &mut snapshot);

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, &ModuleName::from("broken"));
    assert!(matches!(failures[0].1, SyncError::Io { .. }));
    assert_eq!(phase(&snapshot, "broken-v1.0.0"), Phase::Pending);
    assert_eq!(phase(&snapshot, "echoserver-v0.0.1"), Phase::Deployed);
    assert!(!reconciler.gate().is_synchronized());
    assert!(entries(root.path()).contains(&"900-echoserver".to_string()));
    assert!(!entries(root.path())
        .iter()
        .any(|n| n.ends_with(".modrel.tmp")));
}

#[test]
fn out_of_band_removal_is_repaired_after_invalidate() {
    let (root, mut reconciler) = setup();
    let mut snapshot = Snapshot::from_manifests(vec![ReleaseManifest::new(
        "echoserver-v0.0.1",
        "echoserver",
        "0.0.1",
    )]);
    converge(&mut reconciler, &mut snapshot);

    fs::remove_file(root.path().join("modules").join("900-echoserver")).expect("rm");
    let cached = converge(&mut reconciler, &mut snapshot);
    assert!(cached.is_converged(), "cached listing still shows the link");

    reconciler.invalidate();
    converge(&mut reconciler, &mut snapshot);
    assert_eq!(entries(root.path()), ["900-echoserver"]);
}
