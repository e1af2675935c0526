use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use uuid::Uuid;

use super::{
    collect_status, print_status, resolve_layout, run_install, run_uninstall, AppError,
    InstallOptions, SettingsChange, SettingsState, UninstallOptions,
};
use crate::hooks::{registered_commands, EventName};
use crate::layout::ScopeLayout;
use crate::manifest::InstallManifest;
use crate::provision::{Focus, ProvisionError};
use crate::settings::{self, SettingsError};
use crate::ui::{Palette, Progress};

struct Fixture {
    base: PathBuf,
    source: PathBuf,
    layout: ScopeLayout,
}

impl Fixture {
    fn new() -> Self {
        let base = std::env::temp_dir().join(format!("mood-lifter-app-{}", Uuid::now_v7()));
        let source = base.join("source");
        let manifest = InstallManifest::builtin().expect("builtin manifest");
        for group in manifest.groups() {
            let dir = source.join(&group.source_dir);
            std::fs::create_dir_all(&dir).expect("source dir");
            for name in &group.files {
                std::fs::write(dir.join(name), format!("# {name}\n")).expect("source file");
            }
        }
        let layout = ScopeLayout::user(base.join("home").join(".claude"));
        Self {
            base,
            source,
            layout,
        }
    }

    fn install(&self, focus: Focus) -> Result<super::InstallSummary, AppError> {
        let options = InstallOptions {
            layout: self.layout.clone(),
            source: self.source.clone(),
            focus,
            dry_run: false,
            probe_ollama: false,
        };
        run_install(&options, &mut quiet())
    }

    fn uninstall(&self, focus: Focus, complete: bool) -> Result<super::UninstallSummary, AppError> {
        let options = UninstallOptions {
            layout: self.layout.clone(),
            focus,
            complete,
            dry_run: false,
        };
        run_uninstall(&options, &mut quiet())
    }

    fn settings_path(&self) -> PathBuf {
        self.layout.settings_path()
    }

    fn settings(&self) -> Value {
        settings::load(&self.settings_path()).expect("settings should load")
    }

    fn write_settings(&self, contents: &str) {
        std::fs::create_dir_all(&self.layout.root).expect("root dir");
        std::fs::write(self.settings_path(), contents).expect("settings fixture");
    }

    fn hook_command(&self, script: &str) -> String {
        format!(
            "python3 {}",
            self.layout.root.join("hooks").join(script).display()
        )
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.base);
    }
}

fn quiet() -> Progress<Vec<u8>> {
    Progress::new(Vec::new(), Palette::plain())
}

fn backups(path: &Path) -> usize {
    settings::list_backups(path).expect("backups list").len()
}

#[test]
fn fresh_install_registers_every_event_once() {
    let fixture = Fixture::new();
    let summary = fixture.install(Focus::All).expect("install should succeed");
    assert_eq!(summary.warning_count(), 0);
    assert!(matches!(
        summary.settings,
        SettingsChange::Written { backup: None, .. }
    ));

    let doc = fixture.settings();
    for event in EventName::ALL {
        assert_eq!(
            registered_commands(&doc, event.as_str()),
            vec![fixture.hook_command(event.script_name())]
        );
    }
    assert!(fixture.layout.root.join("commands").join("joke.md").is_file());
    assert!(fixture.layout.root.join("lib").join("config.py").is_file());
    assert_eq!(backups(&fixture.settings_path()), 0);
}

#[test]
fn reinstall_leaves_settings_untouched() {
    let fixture = Fixture::new();
    fixture.install(Focus::All).expect("first install");
    let before = std::fs::read(fixture.settings_path()).expect("settings bytes");

    let summary = fixture.install(Focus::All).expect("second install");
    assert!(matches!(summary.settings, SettingsChange::Unchanged(_)));
    assert_eq!(
        std::fs::read(fixture.settings_path()).expect("settings bytes"),
        before
    );
    assert_eq!(backups(&fixture.settings_path()), 0);
}

#[test]
fn install_over_existing_settings_keeps_foreign_state_and_backs_up() {
    let fixture = Fixture::new();
    fixture.write_settings(
        r#"{"model": "opus", "hooks": {"Stop": [{"hooks": [{"type": "command", "command": "afplay done.aiff"}]}]}}"#,
    );

    let summary = fixture.install(Focus::HooksOnly).expect("install");
    match summary.settings {
        SettingsChange::Written {
            backup: Some(backup),
            report,
        } => {
            assert!(backup.is_file());
            assert_eq!(report.added.len(), 3);
        }
        other => panic!("expected a written change with backup, got {other:?}"),
    }

    let doc = fixture.settings();
    assert_eq!(doc["model"], "opus");
    assert_eq!(
        registered_commands(&doc, "Stop"),
        vec![
            "afplay done.aiff".to_string(),
            fixture.hook_command("stop.py")
        ]
    );
    assert!(!fixture.layout.root.join("commands").exists());
}

#[test]
fn hooks_only_uninstall_keeps_colocated_foreign_invocation() {
    let fixture = Fixture::new();
    fixture.install(Focus::All).expect("install");
    let stop = fixture.hook_command("stop.py");
    fixture.write_settings(
        &serde_json::to_string(&json!({
            "hooks": {
                "Stop": [{"matcher": "*", "hooks": [
                    {"type": "command", "command": stop},
                    {"type": "command", "command": "afplay done.aiff"}
                ]}]
            }
        }))
        .expect("fixture json"),
    );

    let summary = fixture.uninstall(Focus::HooksOnly, false).expect("uninstall");
    assert!(matches!(summary.settings, SettingsChange::Written { .. }));
    assert_eq!(
        fixture.settings(),
        json!({
            "hooks": {
                "Stop": [{"matcher": "*", "hooks": [{"type": "command", "command": "afplay done.aiff"}]}]
            }
        })
    );
    assert!(!fixture.layout.root.join("hooks").join("stop.py").exists());
    assert!(fixture.layout.root.join("commands").join("joke.md").is_file());
}

#[test]
fn full_cycle_restores_original_settings() {
    let fixture = Fixture::new();
    let original = json!({"permissions": {"allow": ["Bash(ls)"]}, "theme": "dark"});
    fixture.write_settings(&serde_json::to_string_pretty(&original).expect("json"));

    fixture.install(Focus::All).expect("install");
    fixture.uninstall(Focus::All, true).expect("uninstall");
    assert_eq!(fixture.settings(), original);
    assert!(!fixture.layout.root.join("lib").exists());
    assert!(!fixture.layout.root.join("config").exists());
    assert!(fixture.layout.root.join("hooks").is_dir());
}

#[test]
fn malformed_settings_abort_install_before_any_copy() {
    let fixture = Fixture::new();
    let broken = "{\"hooks\": {\"Stop\": [}";
    fixture.write_settings(broken);

    let err = fixture
        .install(Focus::All)
        .expect_err("malformed settings should abort");
    assert!(matches!(
        err,
        AppError::Settings(SettingsError::Malformed { .. })
    ));
    assert!(err.to_string().contains("settings.json"));
    assert_eq!(
        std::fs::read_to_string(fixture.settings_path()).expect("settings"),
        broken
    );
    assert!(!fixture.layout.root.join("hooks").exists());
    assert_eq!(backups(&fixture.settings_path()), 0);
}

#[test]
fn wrongly_shaped_registry_aborts_install() {
    let fixture = Fixture::new();
    fixture.write_settings("{\"hooks\": [\"python3 stop.py\"]}");
    let err = fixture.install(Focus::All).expect_err("shape error");
    assert!(err.to_string().contains("`hooks` is not a JSON object"));
    assert_eq!(
        std::fs::read_to_string(fixture.settings_path()).expect("settings"),
        "{\"hooks\": [\"python3 stop.py\"]}"
    );
    assert!(!fixture.layout.root.join("hooks").exists());
}

#[test]
fn missing_source_fails_before_creating_anything() {
    let fixture = Fixture::new();
    std::fs::remove_dir_all(fixture.source.join("hooks")).expect("drop hooks source");

    let err = fixture
        .install(Focus::HooksOnly)
        .expect_err("missing source should abort");
    assert!(matches!(
        err,
        AppError::Provision(ProvisionError::MissingSource(_))
    ));
    assert!(!fixture.layout.root.exists());
}

#[test]
fn commands_only_install_does_not_touch_settings() {
    let fixture = Fixture::new();
    let summary = fixture.install(Focus::CommandsOnly).expect("install");
    assert!(matches!(summary.settings, SettingsChange::Skipped));
    assert!(!fixture.settings_path().exists());
    assert!(fixture
        .layout
        .root
        .join("commands")
        .join("jw-text.md")
        .is_file());
}

#[test]
fn dry_run_writes_nothing() {
    let fixture = Fixture::new();
    let options = InstallOptions {
        layout: fixture.layout.clone(),
        source: fixture.source.clone(),
        focus: Focus::All,
        dry_run: true,
        probe_ollama: false,
    };
    let mut progress = quiet();
    let summary = run_install(&options, &mut progress).expect("dry run");
    assert!(matches!(summary.settings, SettingsChange::Planned(ref report) if report.added.len() == 3));
    assert!(!fixture.layout.root.exists());
    let output = String::from_utf8(progress.into_inner()).expect("utf8");
    assert!(output.contains("would copy"));
    assert!(output.contains("would register Stop"));

    fixture.install(Focus::All).expect("install");
    let before = std::fs::read(fixture.settings_path()).expect("bytes");
    let uninstall = UninstallOptions {
        layout: fixture.layout.clone(),
        focus: Focus::All,
        complete: true,
        dry_run: true,
    };
    let summary = run_uninstall(&uninstall, &mut quiet()).expect("dry uninstall");
    assert!(matches!(summary.settings, SettingsChange::Planned(ref report) if report.removed == 3));
    assert_eq!(std::fs::read(fixture.settings_path()).expect("bytes"), before);
    assert!(fixture.layout.root.join("lib").join("config.py").is_file());
}

#[test]
fn uninstall_without_settings_file_succeeds() {
    let fixture = Fixture::new();
    let summary = fixture.uninstall(Focus::All, false).expect("uninstall");
    assert!(matches!(summary.settings, SettingsChange::Unchanged(_)));
    assert!(!fixture.settings_path().exists());
    assert!(!fixture.layout.root.exists());
}

#[test]
fn status_reports_registrations_and_files() {
    let fixture = Fixture::new();
    let before = collect_status(&fixture.layout, false).expect("status");
    assert_eq!(before.settings, SettingsState::Missing);
    assert!(before.events.iter().all(|event| !event.registered));

    fixture.install(Focus::All).expect("install");
    let after = collect_status(&fixture.layout, false).expect("status");
    assert_eq!(after.settings, SettingsState::Present);
    assert!(after.events.iter().all(|event| event.registered));
    assert!(after.groups.iter().all(|group| group.missing.is_empty()));

    let mut progress = quiet();
    print_status(&after, &mut progress).expect("print");
    let output = String::from_utf8(progress.into_inner()).expect("utf8");
    assert!(output.contains("✓ Stop hook registered"));

    fixture.write_settings("not json");
    let broken = collect_status(&fixture.layout, false).expect("status");
    assert!(matches!(broken.settings, SettingsState::Malformed { .. }));
}

#[test]
fn project_scope_requires_existing_directory() {
    let fixture = Fixture::new();
    let err = resolve_layout(Some(&fixture.base.join("nope")), None)
        .expect_err("missing project dir");
    assert!(matches!(err, AppError::InvalidArgument(_)));

    std::fs::create_dir_all(fixture.base.join("proj")).expect("project dir");
    let layout = resolve_layout(Some(&fixture.base.join("proj")), None).expect("project layout");
    assert!(layout.root.ends_with("proj/.claude"));

    let user = resolve_layout(None, Some(Path::new("/opt/claude-cfg"))).expect("user layout");
    assert_eq!(user.root, PathBuf::from("/opt/claude-cfg"));
}

#[test]
fn status_flags_registrations_from_another_location() {
    let fixture = Fixture::new();
    fixture.install(Focus::All).expect("install");
    let moved = json!({
        "hooks": {
            "Stop": [{"hooks": [{"type": "command", "command": "python3 /old/place/hooks/stop.py"}]}]
        }
    });
    fixture.write_settings(&moved.to_string());

    let report = collect_status(&fixture.layout, false).expect("status");
    let stop = report
        .events
        .iter()
        .find(|event| event.event == EventName::Stop)
        .expect("stop status");
    assert!(stop.registered);
    assert!(!stop.current);

    let mut progress = quiet();
    print_status(&report, &mut progress).expect("print");
    let output = String::from_utf8(progress.into_inner()).expect("utf8");
    assert!(output.contains("! Stop hook registered from another location"));
    assert!(output.contains("✗ SessionStart hook not registered"));
}
