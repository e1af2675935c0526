use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use uuid::Uuid;

use super::{
    backup_path, empty_document, inspect, list_backups, load, reconcile, render, save, SaveOutcome,
    SettingsError,
};

fn unique_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mood-lifter-settings-test-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&dir).expect("temp directory should be creatable");
    dir
}

fn write(path: &Path, contents: &str) {
    std::fs::write(path, contents).expect("fixture should be writable");
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("file should be readable")
}

#[test]
fn load_treats_missing_file_as_empty_document() {
    let dir = unique_dir();
    let doc = load(&dir.join("settings.json")).expect("missing file should load");
    assert_eq!(doc, empty_document());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn load_treats_blank_file_as_empty_document() {
    let dir = unique_dir();
    let path = dir.join("settings.json");
    write(&path, "  \n");
    assert_eq!(load(&path).expect("blank file should load"), empty_document());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn inspect_distinguishes_missing_from_empty() {
    let dir = unique_dir();
    let path = dir.join("settings.json");
    assert_eq!(inspect(&path).expect("missing file inspects"), None);
    write(&path, "");
    assert_eq!(
        inspect(&path).expect("empty file inspects"),
        Some(empty_document())
    );
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn load_rejects_unparsable_json() {
    let dir = unique_dir();
    let path = dir.join("settings.json");
    write(&path, "{ \"hooks\": { ");
    let err = load(&path).expect_err("broken json should fail");
    assert!(matches!(err, SettingsError::Malformed { .. }));
    assert!(err.to_string().contains("settings.json"));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn load_rejects_non_object_top_level() {
    let dir = unique_dir();
    let path = dir.join("settings.json");
    write(&path, "[1, 2, 3]");
    match load(&path).expect_err("array document should fail") {
        SettingsError::Malformed { detail, .. } => assert!(detail.contains("JSON object")),
        other => panic!("unexpected error variant: {other}"),
    }
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn save_to_new_path_creates_no_backup() {
    let dir = unique_dir();
    let path = dir.join("nested").join("settings.json");
    let backup = save(&path, &json!({"model": "opus"})).expect("save should succeed");
    assert!(backup.is_none());
    assert!(path.exists());
    assert!(list_backups(&path).expect("backups should list").is_empty());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn every_save_over_existing_file_creates_exactly_one_backup() {
    let dir = unique_dir();
    let path = dir.join("settings.json");
    write(&path, "{\"first\": true}\n");

    let first = save(&path, &json!({"second": true}))
        .expect("save should succeed")
        .expect("backup should be created");
    assert_eq!(read(&first), "{\"first\": true}\n");
    assert_eq!(list_backups(&path).expect("backups should list").len(), 1);

    let second = save(&path, &json!({"third": true}))
        .expect("save should succeed")
        .expect("backup should be created");
    assert_ne!(first, second);
    assert!(read(&second).contains("second"));
    assert_eq!(list_backups(&path).expect("backups should list").len(), 2);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn backup_name_uses_suffix_and_sortable_timestamp() {
    let dir = unique_dir();
    let path = dir.join("settings.json");
    write(&path, "{}\n");
    let backup = save(&path, &json!({"a": 1}))
        .expect("save should succeed")
        .expect("backup should exist");
    let name = backup
        .file_name()
        .and_then(|value| value.to_str())
        .expect("utf8 name")
        .to_string();
    let stamp = name
        .strip_prefix("settings.json.backup.")
        .expect("backup should carry the fixed suffix");
    assert_eq!(stamp.len(), 15);
    assert_eq!(stamp.as_bytes()[8], b'_');
    assert!(stamp
        .chars()
        .enumerate()
        .all(|(idx, ch)| idx == 8 || ch.is_ascii_digit()));
    assert_eq!(
        backup_path(&path, "20260101_120000"),
        dir.join("settings.json.backup.20260101_120000")
    );
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn resaving_untouched_document_is_byte_identical() {
    let dir = unique_dir();
    let path = dir.join("settings.json");
    let original = json!({
        "zeta": {"keep": [1, 2, {"deep": null}]},
        "alpha": "value",
        "hooks": {"Stop": [{"hooks": [{"type": "command", "command": "say done"}]}]}
    });
    save(&path, &original).expect("first save should succeed");
    let first_bytes = read(&path);

    let reloaded = load(&path).expect("reload should succeed");
    save(&path, &reloaded).expect("second save should succeed");
    assert_eq!(read(&path), first_bytes);
    assert!(first_bytes.ends_with("}\n"));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn unknown_keys_keep_their_order_through_round_trip() {
    let dir = unique_dir();
    let path = dir.join("settings.json");
    write(
        &path,
        "{\"zeta\": 1, \"permissions\": {\"allow\": [\"Bash(ls)\"]}, \"alpha\": 2}",
    );
    let doc = load(&path).expect("load should succeed");
    let rendered = render(&doc).expect("render should succeed");
    let zeta = rendered.find("zeta").expect("zeta key");
    let permissions = rendered.find("permissions").expect("permissions key");
    let alpha = rendered.find("alpha").expect("alpha key");
    assert!(zeta < permissions && permissions < alpha);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn reconcile_without_changes_writes_nothing() {
    let dir = unique_dir();
    let path = dir.join("settings.json");
    write(&path, "{\"model\":\"sonnet\"}");

    let result = reconcile(&path, |doc| Ok((doc.clone(), ()))).expect("reconcile should work");
    assert_eq!(result.outcome, SaveOutcome::Unchanged);
    assert_eq!(read(&path), "{\"model\":\"sonnet\"}");
    assert!(list_backups(&path).expect("backups should list").is_empty());
    assert!(!dir.join("settings.json.lock").exists());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn reconcile_creates_missing_document_without_backup() {
    let dir = unique_dir();
    let path = dir.join("project").join(".claude").join("settings.json");

    let result = reconcile(&path, |_| Ok((json!({"hooks": {}}), 7)))
        .expect("reconcile should work");
    assert_eq!(result.report, 7);
    assert_eq!(result.outcome, SaveOutcome::Written { backup: None });
    let saved: Value = serde_json::from_str(&read(&path)).expect("saved file should parse");
    assert_eq!(saved, json!({"hooks": {}}));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn reconcile_aborts_on_malformed_document_and_keeps_bytes() {
    let dir = unique_dir();
    let path = dir.join("settings.json");
    let broken = "{\"hooks\": [,,]}";
    write(&path, broken);

    let err = reconcile(&path, |_| Ok((json!({"replaced": true}), ())))
        .expect_err("malformed file should abort");
    assert!(matches!(err, SettingsError::Malformed { .. }));
    assert_eq!(read(&path), broken);
    assert!(list_backups(&path).expect("backups should list").is_empty());
    assert!(!dir.join("settings.json.lock").exists());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn reconcile_refuses_to_overwrite_concurrent_change() {
    let dir = unique_dir();
    let path = dir.join("settings.json");
    write(&path, "{\"a\": 1}");

    let err = reconcile(&path, |doc| {
        write(&path, "{\"a\": 1, \"from_other_writer\": true}");
        let mut next = doc.clone();
        next["b"] = json!(2);
        Ok((next, ()))
    })
    .expect_err("stale merge should not be written");
    assert!(matches!(err, SettingsError::ConcurrentModification(_)));
    assert_eq!(read(&path), "{\"a\": 1, \"from_other_writer\": true}");
    assert!(list_backups(&path).expect("backups should list").is_empty());
    let _ = std::fs::remove_dir_all(dir);
}

#[cfg(unix)]
#[test]
fn reconcile_writes_through_a_symlinked_settings_file() {
    let dir = unique_dir();
    let dotfiles = dir.join("dotfiles");
    let config = dir.join("claude");
    std::fs::create_dir_all(&dotfiles).expect("dotfiles dir");
    std::fs::create_dir_all(&config).expect("config dir");
    let real = dotfiles.join("settings.json");
    write(&real, "{\"model\": \"opus\"}");
    let link = config.join("settings.json");
    std::os::unix::fs::symlink(&real, &link).expect("symlink");

    let outcome = reconcile(&link, |doc| {
        let mut next = doc.clone();
        next["hooks"] = json!({});
        Ok((next, ()))
    })
    .expect("reconcile through link");
    assert!(matches!(outcome.outcome, SaveOutcome::Written { backup: Some(_) }));

    let metadata = std::fs::symlink_metadata(&link).expect("link metadata");
    assert!(metadata.file_type().is_symlink());
    let written: Value = serde_json::from_str(&read(&real)).expect("target json");
    assert_eq!(written, json!({"model": "opus", "hooks": {}}));

    let backups = list_backups(&link).expect("backups");
    assert_eq!(backups.len(), 1);
    assert_eq!(read(&backups[0]), "{\"model\": \"opus\"}");
    let _ = std::fs::remove_dir_all(dir);
}

#[cfg(unix)]
#[test]
fn save_creates_the_target_of_a_dangling_link() {
    let dir = unique_dir();
    let link = dir.join("settings.json");
    std::os::unix::fs::symlink("real-settings.json", &link).expect("symlink");

    let backup = save(&link, &json!({"hooks": {}})).expect("save through dangling link");
    assert!(backup.is_none());
    assert!(std::fs::symlink_metadata(&link)
        .expect("link metadata")
        .file_type()
        .is_symlink());
    assert_eq!(read(&dir.join("real-settings.json")), "{\n  \"hooks\": {}\n}\n");
    let _ = std::fs::remove_dir_all(dir);
}
