use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::{
    check_sources, deprovision, inventory, plan_copies, plan_removals, prepare_destination,
    provision, Focus, GroupSelection, ProvisionError, ProvisionWarning,
};
use crate::layout::ScopeLayout;
use crate::manifest::{AssetGroup, InstallManifest};

fn unique_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mood-lifter-{label}-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&dir).expect("temp directory should be creatable");
    dir
}

fn manifest() -> InstallManifest {
    InstallManifest::builtin().expect("builtin manifest should parse")
}

fn seed_sources(root: &Path, manifest: &InstallManifest) {
    for group in manifest.groups() {
        let dir = root.join(&group.source_dir);
        std::fs::create_dir_all(&dir).expect("source dir should be creatable");
        for name in &group.files {
            std::fs::write(dir.join(name), format!("# {name}\n")).expect("source file");
        }
    }
}

#[test]
fn install_selection_follows_focus() {
    let all = GroupSelection::for_install(Focus::All);
    assert_eq!(all.groups, AssetGroup::ALL.to_vec());
    assert!(all.settings);

    let hooks = GroupSelection::for_install(Focus::HooksOnly);
    assert!(hooks.includes(AssetGroup::Hooks));
    assert!(hooks.includes(AssetGroup::Defaults));
    assert!(!hooks.includes(AssetGroup::Commands));
    assert!(hooks.settings);

    let commands = GroupSelection::for_install(Focus::CommandsOnly);
    assert_eq!(
        commands.groups,
        vec![AssetGroup::Commands, AssetGroup::Library]
    );
    assert!(!commands.settings);
}

#[test]
fn uninstall_selection_only_touches_library_when_complete() {
    let plain = GroupSelection::for_uninstall(Focus::All, false);
    assert_eq!(plain.groups, vec![AssetGroup::Hooks, AssetGroup::Commands]);
    assert!(plain.prune_dirs.is_empty());

    let complete = GroupSelection::for_uninstall(Focus::All, true);
    assert!(complete.includes(AssetGroup::Library));
    assert!(complete.includes(AssetGroup::Defaults));
    assert_eq!(
        complete.prune_dirs,
        vec![AssetGroup::Library, AssetGroup::Defaults]
    );

    let commands = GroupSelection::for_uninstall(Focus::CommandsOnly, false);
    assert!(!commands.settings);
    assert_eq!(commands.groups, vec![AssetGroup::Commands]);
}

#[test]
fn check_sources_reports_missing_root_and_group_dirs() {
    let dir = unique_dir("sources");
    let manifest = manifest();
    let selection = GroupSelection::for_install(Focus::All);

    let missing_root = dir.join("absent");
    match check_sources(&missing_root, &manifest, &selection) {
        Err(ProvisionError::MissingSource(path)) => assert_eq!(path, missing_root),
        other => panic!("expected missing source, got {other:?}"),
    }

    std::fs::create_dir_all(dir.join("hooks")).expect("hooks dir");
    let err = check_sources(&dir, &manifest, &selection).expect_err("commands dir missing");
    assert!(err.to_string().contains("commands"));

    let hooks_only = GroupSelection {
        groups: vec![AssetGroup::Hooks],
        settings: true,
        prune_dirs: Vec::new(),
    };
    assert!(check_sources(&dir, &manifest, &hooks_only).is_ok());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn prepare_destination_fails_when_root_is_a_file() {
    let dir = unique_dir("dest-file");
    let blocker = dir.join("not-a-dir");
    std::fs::write(&blocker, "x").expect("blocker file");
    let layout = ScopeLayout::user(blocker.join(".claude"));

    let err = prepare_destination(
        &layout,
        &manifest(),
        &GroupSelection::for_install(Focus::All),
    )
    .expect_err("root under a file cannot be created");
    assert!(matches!(err, ProvisionError::DirectoryCreate { .. }));
    assert!(err.to_string().contains("not-a-dir"));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn provision_copies_every_selected_file() {
    let source = unique_dir("src");
    let dest = unique_dir("dest");
    let manifest = manifest();
    seed_sources(&source, &manifest);
    let layout = ScopeLayout::user(dest.join(".claude"));
    let selection = GroupSelection::for_install(Focus::HooksOnly);

    prepare_destination(&layout, &manifest, &selection).expect("destination");
    let report = provision(&source, &layout, &manifest, &selection);
    assert!(report.warnings.is_empty());
    assert_eq!(report.copied.len(), 3 + 11 + 1);
    assert!(layout.root.join("hooks").join("stop.py").is_file());
    assert!(layout.root.join("config").join("defaults.json").is_file());
    assert!(!layout.root.join("commands").exists());

    let _ = std::fs::remove_dir_all(source);
    let _ = std::fs::remove_dir_all(dest);
}

#[test]
fn provision_continues_past_a_failed_copy() {
    let source = unique_dir("src-partial");
    let dest = unique_dir("dest-partial");
    let manifest = manifest();
    seed_sources(&source, &manifest);
    std::fs::remove_file(source.join("commands").join("joke.md")).expect("drop one source");
    let layout = ScopeLayout::user(dest.join(".claude"));
    let selection = GroupSelection::for_install(Focus::CommandsOnly);

    prepare_destination(&layout, &manifest, &selection).expect("destination");
    let report = provision(&source, &layout, &manifest, &selection);
    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(
        &report.warnings[0],
        ProvisionWarning::CopyFailure { from, .. } if from.ends_with("joke.md")
    ));
    assert!(layout.root.join("commands").join("jw-text.md").is_file());
    assert!(layout.root.join("lib").join("config.py").is_file());

    let _ = std::fs::remove_dir_all(source);
    let _ = std::fs::remove_dir_all(dest);
}

#[test]
fn deprovision_removes_listed_files_only() {
    let source = unique_dir("src-remove");
    let dest = unique_dir("dest-remove");
    let manifest = manifest();
    seed_sources(&source, &manifest);
    let layout = ScopeLayout::user(dest.join(".claude"));
    let install = GroupSelection::for_install(Focus::All);
    prepare_destination(&layout, &manifest, &install).expect("destination");
    provision(&source, &layout, &manifest, &install);

    let foreign = layout.root.join("hooks").join("someone_elses.py");
    std::fs::write(&foreign, "print('hi')\n").expect("foreign hook");

    let uninstall = GroupSelection::for_uninstall(Focus::All, false);
    let report = deprovision(&layout, &manifest, &uninstall);
    assert_eq!(report.removed.len(), 5);
    assert!(report.warnings.is_empty());
    assert!(foreign.is_file());
    assert!(layout.root.join("lib").join("config.py").is_file());

    let again = deprovision(&layout, &manifest, &uninstall);
    assert!(again.removed.is_empty());
    assert_eq!(again.absent.len(), 5);

    let _ = std::fs::remove_dir_all(source);
    let _ = std::fs::remove_dir_all(dest);
}

#[test]
fn complete_removal_prunes_only_empty_directories() {
    let source = unique_dir("src-complete");
    let dest = unique_dir("dest-complete");
    let manifest = manifest();
    seed_sources(&source, &manifest);
    let layout = ScopeLayout::user(dest.join(".claude"));
    let install = GroupSelection::for_install(Focus::All);
    prepare_destination(&layout, &manifest, &install).expect("destination");
    provision(&source, &layout, &manifest, &install);

    let shared = layout.root.join("lib").join("other_tool.py");
    std::fs::write(&shared, "pass\n").expect("shared library file");

    let report = deprovision(
        &layout,
        &manifest,
        &GroupSelection::for_uninstall(Focus::All, true),
    );
    assert!(report.warnings.is_empty());
    assert!(shared.is_file());
    assert_eq!(report.kept_dirs, vec![layout.root.join("lib")]);
    assert_eq!(report.removed_dirs, vec![layout.root.join("config")]);
    assert!(!layout.root.join("config").exists());

    let _ = std::fs::remove_dir_all(source);
    let _ = std::fs::remove_dir_all(dest);
}

#[test]
fn plans_and_inventory_reflect_disk_state() {
    let source = unique_dir("src-plan");
    let dest = unique_dir("dest-plan");
    let manifest = manifest();
    let layout = ScopeLayout::project(dest.clone());
    let selection = GroupSelection::for_install(Focus::All);

    let copies = plan_copies(&source, &layout, &manifest, &selection);
    assert_eq!(copies.len(), 2 + 3 + 11 + 1);
    assert!(copies
        .iter()
        .any(|copy| copy.to == dest.join(".claude").join("hooks").join("stop.py")));
    assert!(plan_removals(&layout, &manifest, &selection).is_empty());

    std::fs::create_dir_all(layout.root.join("hooks")).expect("hooks dir");
    std::fs::write(layout.root.join("hooks").join("stop.py"), "x").expect("hook");
    assert_eq!(plan_removals(&layout, &manifest, &selection).len(), 1);

    let hooks = inventory(&layout, &manifest)
        .into_iter()
        .find(|entry| entry.group == AssetGroup::Hooks)
        .expect("hooks inventory");
    assert_eq!(hooks.present, vec!["stop.py".to_string()]);
    assert_eq!(hooks.missing.len(), 2);

    let _ = std::fs::remove_dir_all(source);
    let _ = std::fs::remove_dir_all(dest);
}
