use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{json, Value};
use uuid::Uuid;

const COMMANDS: [&str; 2] = ["joke.md", "jw-text.md"];
const HOOKS: [&str; 3] = ["sessionstart.py", "stop.py", "notification.py"];
const LIBRARY: [&str; 11] = [
    "api_integrations.py",
    "config.py",
    "constants.py",
    "external_apis.py",
    "joke_command.py",
    "jw_daily_text.py",
    "jw_text_command.py",
    "message_generator.py",
    "ollama_models.py",
    "rate_limiter.py",
    "stoic_quotes.py",
];

struct Workspace {
    root: PathBuf,
}

impl Workspace {
    fn new(prefix: &str) -> Self {
        let root = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::now_v7()));
        std::fs::create_dir_all(root.join("home")).expect("workspace should be creatable");
        let source = root.join("source");
        for (dir, files) in [
            ("commands", &COMMANDS[..]),
            ("hooks", &HOOKS[..]),
            ("lib", &LIBRARY[..]),
            ("config", &["defaults.json"][..]),
        ] {
            std::fs::create_dir_all(source.join(dir)).expect("source dir");
            for name in files {
                std::fs::write(source.join(dir).join(name), format!("# {name}\n"))
                    .expect("source file");
            }
        }
        Self { root }
    }

    fn config_dir(&self) -> PathBuf {
        self.root.join("home").join(".claude")
    }

    fn settings_path(&self) -> PathBuf {
        self.config_dir().join("settings.json")
    }

    fn source(&self) -> PathBuf {
        self.root.join("source")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_mood-lifter"))
            .args(args)
            .env("HOME", self.root.join("home"))
            .env("CLAUDE_CONFIG_DIR", self.config_dir())
            .env("MOOD_LIFTER_SOURCE", self.source())
            .env_remove("MOOD_LIFTER_LOG")
            .env("NO_COLOR", "1")
            .current_dir(&self.root)
            .output()
            .expect("mood-lifter should run")
    }

    fn settings(&self) -> Value {
        let raw = std::fs::read_to_string(self.settings_path()).expect("settings readable");
        serde_json::from_str(&raw).expect("settings should be valid json")
    }

    fn backups(&self) -> usize {
        std::fs::read_dir(self.config_dir())
            .expect("config dir readable")
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("settings.json.backup.")
            })
            .count()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "expected success but failed.\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn assert_failure(output: &Output) {
    assert_eq!(
        output.status.code(),
        Some(1),
        "expected exit 1.\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stop_commands(doc: &Value) -> Vec<String> {
    doc["hooks"]["Stop"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|group| group["hooks"].as_array())
        .flatten()
        .filter_map(|invocation| invocation["command"].as_str())
        .map(str::to_string)
        .collect()
}

fn owned_stop_command(config_dir: &Path) -> String {
    format!("python3 {}", config_dir.join("hooks").join("stop.py").display())
}

#[test]
fn install_then_reinstall_is_stable() {
    let ws = Workspace::new("mood-lifter-cli-install");

    let first = ws.run(&["install", "--no-ollama"]);
    assert_success(&first);
    let stdout = String::from_utf8_lossy(&first.stdout);
    assert!(stdout.contains("registered hooks: SessionStart, Stop, Notification"));
    assert!(!stdout.contains('\u{1b}'));

    let doc = ws.settings();
    for event in ["SessionStart", "Stop", "Notification"] {
        assert_eq!(doc["hooks"][event].as_array().map(Vec::len), Some(1));
    }
    assert_eq!(stop_commands(&doc), vec![owned_stop_command(&ws.config_dir())]);
    assert!(ws.config_dir().join("lib").join("stoic_quotes.py").is_file());
    assert_eq!(ws.backups(), 0);

    let before = std::fs::read(ws.settings_path()).expect("settings bytes");
    let second = ws.run(&["install", "--no-ollama"]);
    assert_success(&second);
    assert!(String::from_utf8_lossy(&second.stdout).contains("hooks already registered"));
    assert_eq!(std::fs::read(ws.settings_path()).expect("settings bytes"), before);
    assert_eq!(ws.backups(), 0);
}

#[test]
fn hooks_only_uninstall_keeps_foreign_entries() {
    let ws = Workspace::new("mood-lifter-cli-uninstall");
    assert_success(&ws.run(&["install", "--no-ollama"]));

    let mut doc = ws.settings();
    doc["hooks"]["Stop"]
        .as_array_mut()
        .expect("stop groups")
        .insert(
            0,
            json!({"hooks": [{"type": "command", "command": "afplay done.aiff"}]}),
        );
    doc["permissions"] = json!({"allow": ["Bash(ls)"]});
    std::fs::write(
        ws.settings_path(),
        serde_json::to_string_pretty(&doc).expect("json"),
    )
    .expect("settings writable");

    let output = ws.run(&["uninstall", "--hooks-only"]);
    assert_success(&output);

    let after = ws.settings();
    assert_eq!(stop_commands(&after), vec!["afplay done.aiff".to_string()]);
    assert!(after["hooks"].get("SessionStart").is_none());
    assert!(after["hooks"].get("Notification").is_none());
    assert_eq!(after["permissions"], json!({"allow": ["Bash(ls)"]}));
    assert!(!ws.config_dir().join("hooks").join("stop.py").exists());
    assert!(ws.config_dir().join("commands").join("joke.md").is_file());
    assert_eq!(ws.backups(), 1);
}

#[test]
fn malformed_settings_exit_nonzero_and_stay_untouched() {
    let ws = Workspace::new("mood-lifter-cli-malformed");
    std::fs::create_dir_all(ws.config_dir()).expect("config dir");
    let broken = "{ \"hooks\": { \"Stop\": [ }";
    std::fs::write(ws.settings_path(), broken).expect("settings writable");

    let output = ws.run(&["install", "--no-ollama"]);
    assert_failure(&output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error: malformed settings document"));
    assert!(stderr.contains("settings.json"));
    assert_eq!(
        std::fs::read_to_string(ws.settings_path()).expect("settings"),
        broken
    );
    assert!(!ws.config_dir().join("hooks").exists());
    assert_eq!(ws.backups(), 0);

    let uninstall = ws.run(&["uninstall"]);
    assert_failure(&uninstall);
    assert_eq!(
        std::fs::read_to_string(ws.settings_path()).expect("settings"),
        broken
    );
}

#[test]
fn missing_source_exits_nonzero_before_creating_anything() {
    let ws = Workspace::new("mood-lifter-cli-missing-source");
    let missing = ws.root.join("nowhere");
    let output = ws.run(&[
        "install",
        "--no-ollama",
        "--source",
        missing.to_str().expect("utf8 path"),
    ]);
    assert_failure(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("required source directory missing"));
    assert!(!ws.config_dir().exists());
}

#[test]
fn project_scope_installs_under_project_dot_claude() {
    let ws = Workspace::new("mood-lifter-cli-project");
    let project = ws.root.join("app");
    std::fs::create_dir_all(&project).expect("project dir");

    let output = ws.run(&[
        "install",
        "--no-ollama",
        "--project",
        project.to_str().expect("utf8 path"),
    ]);
    assert_success(&output);
    assert!(project.join(".claude").join("settings.json").is_file());
    assert!(project.join(".claude").join("hooks").join("stop.py").is_file());
    assert!(!ws.config_dir().exists());

    let status = ws.run(&[
        "status",
        "--no-ollama",
        "--json",
        "--project",
        project.to_str().expect("utf8 path"),
    ]);
    assert_success(&status);
    let report: Value = serde_json::from_slice(&status.stdout).expect("status json");
    assert_eq!(report["settings"]["state"], "present");
    assert!(report["events"]
        .as_array()
        .expect("events")
        .iter()
        .all(|event| event["registered"] == true));
}

#[test]
fn dry_run_touches_nothing() {
    let ws = Workspace::new("mood-lifter-cli-dry-run");
    let output = ws.run(&["install", "--dry-run"]);
    assert_success(&output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("nothing was written"));
    assert!(!ws.config_dir().exists());
}
