//! Install, uninstall and status flows built from the lower-level pieces.

use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::hooks::{
    merge_owned_hooks, registered_commands, remove_owned_hooks, EventName, MergeReport,
    OwnedHooks, RemovalPatterns, RemovalReport,
};
use crate::layout::{self, ScopeLayout};
use crate::manifest::{AssetGroup, InstallManifest, ManifestError};
use crate::ollama::{self, OllamaStatus};
use crate::provision::{
    self, Focus, GroupInventory, GroupSelection, ProvisionError, ProvisionReport,
};
use crate::settings::{self, SaveOutcome, SettingsError};
use crate::ui::Progress;

#[derive(Debug)]
pub enum AppError {
    Io(io::Error),
    InvalidArgument(String),
    Manifest(ManifestError),
    Settings(SettingsError),
    Provision(ProvisionError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "I/O error: {}", err),
            AppError::InvalidArgument(message) => write!(f, "{}", message),
            AppError::Manifest(err) => write!(f, "{}", err),
            AppError::Settings(err) => write!(f, "{}", err),
            AppError::Provision(err) => write!(f, "{}", err),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            AppError::InvalidArgument(_) => None,
            AppError::Manifest(err) => Some(err),
            AppError::Settings(err) => Some(err),
            AppError::Provision(err) => Some(err),
        }
    }
}

impl From<io::Error> for AppError {
    fn from(value: io::Error) -> Self {
        AppError::Io(value)
    }
}

impl From<ManifestError> for AppError {
    fn from(value: ManifestError) -> Self {
        AppError::Manifest(value)
    }
}

impl From<SettingsError> for AppError {
    fn from(value: SettingsError) -> Self {
        AppError::Settings(value)
    }
}

impl From<ProvisionError> for AppError {
    fn from(value: ProvisionError) -> Self {
        AppError::Provision(value)
    }
}

/// Picks the scope root from `--project` / `--config-dir` / `$HOME`.
pub fn resolve_layout(
    project: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<ScopeLayout, AppError> {
    if let Some(dir) = project {
        let resolved = layout::resolve_project_dir(dir).map_err(|err| {
            AppError::InvalidArgument(format!(
                "project directory {} is not usable: {}",
                dir.display(),
                err
            ))
        })?;
        return Ok(ScopeLayout::project(resolved));
    }

    let home = layout::home_dir();
    let root = layout::user_root(config_dir, home.as_deref()).ok_or_else(|| {
        AppError::InvalidArgument(
            "cannot locate the user configuration root; set HOME or pass --config-dir"
                .to_string(),
        )
    })?;
    let root = if root.is_absolute() {
        root
    } else {
        std::env::current_dir()?.join(root)
    };
    Ok(ScopeLayout::user(root))
}

#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub layout: ScopeLayout,
    pub source: PathBuf,
    pub focus: Focus,
    pub dry_run: bool,
    pub probe_ollama: bool,
}

#[derive(Debug, Clone)]
pub struct UninstallOptions {
    pub layout: ScopeLayout,
    pub focus: Focus,
    pub complete: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsChange<R> {
    Skipped,
    Unchanged(R),
    Written { report: R, backup: Option<PathBuf> },
    Planned(R),
}

#[derive(Debug)]
pub struct InstallSummary {
    pub files: ProvisionReport,
    pub settings: SettingsChange<MergeReport>,
    pub ollama: OllamaStatus,
}

impl InstallSummary {
    pub fn warning_count(&self) -> usize {
        self.files.warnings.len()
    }
}

#[derive(Debug)]
pub struct UninstallSummary {
    pub files: ProvisionReport,
    pub settings: SettingsChange<RemovalReport>,
}

impl UninstallSummary {
    pub fn warning_count(&self) -> usize {
        self.files.warnings.len()
    }
}

fn hooks_dir(layout: &ScopeLayout, manifest: &InstallManifest) -> Result<PathBuf, AppError> {
    manifest
        .group(AssetGroup::Hooks)
        .map(|group| layout.group_dir(group))
        .ok_or_else(|| {
            AppError::Manifest(ManifestError::InvalidDefinition(
                "hooks group is missing".to_string(),
            ))
        })
}

fn merge_for_path(
    path: &Path,
    doc: &serde_json::Value,
    owned: &OwnedHooks,
) -> Result<(serde_json::Value, MergeReport), SettingsError> {
    merge_owned_hooks(doc, owned).map_err(|err| SettingsError::malformed(path, err.to_string()))
}

pub fn run_install<W: Write>(
    options: &InstallOptions,
    progress: &mut Progress<W>,
) -> Result<InstallSummary, AppError> {
    let manifest = InstallManifest::builtin()?;
    let selection = GroupSelection::for_install(options.focus);
    let layout = &options.layout;
    let settings_path = layout.settings_path();

    provision::check_sources(&options.source, &manifest, &selection)?;
    let owned = OwnedHooks::for_hooks_dir(&hooks_dir(layout, &manifest)?);
    if selection.settings {
        if let Some(doc) = settings::inspect(&settings_path)? {
            merge_for_path(&settings_path, &doc, &owned)?;
        }
    }

    if options.dry_run {
        return plan_install(options, &manifest, &selection, &owned, progress);
    }

    progress.banner("MOOD LIFTER INSTALL")?;
    progress.step(&format!(
        "installing into {} ({})",
        layout.root.display(),
        layout.scope
    ))?;
    provision::prepare_destination(layout, &manifest, &selection)?;
    let files = provision::provision(&options.source, layout, &manifest, &selection);
    for warning in &files.warnings {
        progress.warn(&warning.to_string())?;
    }
    progress.ok(&format!("copied {} file(s)", files.copied.len()))?;

    let settings_change = if selection.settings {
        progress.step(&format!("registering hooks in {}", settings_path.display()))?;
        let reconciled = settings::reconcile(&settings_path, |doc| {
            merge_for_path(&settings_path, doc, &owned)
        })?;
        let change = match reconciled.outcome {
            SaveOutcome::Unchanged => SettingsChange::Unchanged(reconciled.report),
            SaveOutcome::Written { backup } => SettingsChange::Written {
                report: reconciled.report,
                backup,
            },
        };
        report_merge(&change, progress)?;
        change
    } else {
        SettingsChange::Skipped
    };

    let ollama = if options.probe_ollama {
        let status = ollama::probe();
        report_ollama(&status, progress)?;
        status
    } else {
        OllamaStatus::Skipped
    };

    let summary = InstallSummary {
        files,
        settings: settings_change,
        ollama,
    };
    tracing::debug!(
        copied = summary.files.copied.len(),
        settings = ?summary.settings,
        ollama = ?summary.ollama,
        "install finished"
    );
    finish(summary.warning_count(), "install complete", progress)?;
    Ok(summary)
}

fn plan_install<W: Write>(
    options: &InstallOptions,
    manifest: &InstallManifest,
    selection: &GroupSelection,
    owned: &OwnedHooks,
    progress: &mut Progress<W>,
) -> Result<InstallSummary, AppError> {
    let layout = &options.layout;
    progress.heading(&format!("dry run: install into {}", layout.root.display()))?;
    for copy in provision::plan_copies(&options.source, layout, manifest, selection) {
        progress.step(&format!(
            "would copy {} -> {}",
            copy.from.display(),
            copy.to.display()
        ))?;
    }

    let settings_change = if selection.settings {
        let path = layout.settings_path();
        let doc = settings::load(&path)?;
        let (_, report) = merge_for_path(&path, &doc, owned)?;
        for event in &report.added {
            progress.step(&format!("would register {event} in {}", path.display()))?;
        }
        if !report.changed() {
            progress.note("hooks already registered; settings would not change")?;
        }
        SettingsChange::Planned(report)
    } else {
        SettingsChange::Skipped
    };

    progress.note("nothing was written")?;
    Ok(InstallSummary {
        files: ProvisionReport::default(),
        settings: settings_change,
        ollama: OllamaStatus::Skipped,
    })
}

pub fn run_uninstall<W: Write>(
    options: &UninstallOptions,
    progress: &mut Progress<W>,
) -> Result<UninstallSummary, AppError> {
    let manifest = InstallManifest::builtin()?;
    let selection = GroupSelection::for_uninstall(options.focus, options.complete);
    let layout = &options.layout;
    let settings_path = layout.settings_path();
    let patterns = RemovalPatterns::for_hooks_dir(&hooks_dir(layout, &manifest)?);

    if options.dry_run {
        return plan_uninstall(options, &manifest, &selection, &patterns, progress);
    }

    progress.banner("MOOD LIFTER UNINSTALL")?;
    let settings_change = if selection.settings {
        progress.step(&format!(
            "removing hook registrations from {}",
            settings_path.display()
        ))?;
        let reconciled = settings::reconcile(&settings_path, |doc| {
            Ok(remove_owned_hooks(doc, &patterns))
        })?;
        let change = match reconciled.outcome {
            SaveOutcome::Unchanged => SettingsChange::Unchanged(reconciled.report),
            SaveOutcome::Written { backup } => SettingsChange::Written {
                report: reconciled.report,
                backup,
            },
        };
        report_removal(&change, progress)?;
        change
    } else {
        SettingsChange::Skipped
    };

    progress.step(&format!("removing files from {}", layout.root.display()))?;
    let files = provision::deprovision(layout, &manifest, &selection);
    for warning in &files.warnings {
        progress.warn(&warning.to_string())?;
    }
    progress.ok(&format!("removed {} file(s)", files.removed.len()))?;
    if !files.absent.is_empty() {
        progress.note(&format!("{} file(s) were already gone", files.absent.len()))?;
    }
    for dir in &files.removed_dirs {
        progress.ok(&format!("removed empty directory {}", dir.display()))?;
    }
    for dir in &files.kept_dirs {
        progress.note(&format!("kept {} (other files remain)", dir.display()))?;
    }

    let summary = UninstallSummary {
        files,
        settings: settings_change,
    };
    tracing::debug!(
        removed = summary.files.removed.len(),
        settings = ?summary.settings,
        "uninstall finished"
    );
    finish(summary.warning_count(), "uninstall complete", progress)?;
    Ok(summary)
}

fn plan_uninstall<W: Write>(
    options: &UninstallOptions,
    manifest: &InstallManifest,
    selection: &GroupSelection,
    patterns: &RemovalPatterns,
    progress: &mut Progress<W>,
) -> Result<UninstallSummary, AppError> {
    let layout = &options.layout;
    progress.heading(&format!("dry run: uninstall from {}", layout.root.display()))?;

    let settings_change = if selection.settings {
        let path = layout.settings_path();
        let doc = settings::load(&path)?;
        let (_, report) = remove_owned_hooks(&doc, patterns);
        if report.changed() {
            progress.step(&format!(
                "would remove {} hook registration(s) from {}",
                report.removed,
                path.display()
            ))?;
        } else {
            progress.note("no hook registrations found; settings would not change")?;
        }
        SettingsChange::Planned(report)
    } else {
        SettingsChange::Skipped
    };

    for path in provision::plan_removals(layout, manifest, selection) {
        progress.step(&format!("would remove {}", path.display()))?;
    }
    progress.note("nothing was written")?;
    Ok(UninstallSummary {
        files: ProvisionReport::default(),
        settings: settings_change,
    })
}

fn report_merge<W: Write>(
    change: &SettingsChange<MergeReport>,
    progress: &mut Progress<W>,
) -> io::Result<()> {
    match change {
        SettingsChange::Written { report, backup } => {
            let events = report
                .added
                .iter()
                .map(|event| event.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            progress.ok(&format!("registered hooks: {events}"))?;
            if let Some(backup) = backup {
                progress.note(&format!("previous settings saved to {}", backup.display()))?;
            }
        }
        SettingsChange::Unchanged(_) => progress.ok("hooks already registered")?,
        SettingsChange::Skipped | SettingsChange::Planned(_) => {}
    }
    Ok(())
}

fn report_removal<W: Write>(
    change: &SettingsChange<RemovalReport>,
    progress: &mut Progress<W>,
) -> io::Result<()> {
    match change {
        SettingsChange::Written { report, backup } => {
            progress.ok(&format!(
                "removed {} hook registration(s)",
                report.removed
            ))?;
            if let Some(backup) = backup {
                progress.note(&format!("previous settings saved to {}", backup.display()))?;
            }
        }
        SettingsChange::Unchanged(_) => progress.ok("no hook registrations to remove")?,
        SettingsChange::Skipped | SettingsChange::Planned(_) => {}
    }
    Ok(())
}

fn report_ollama<W: Write>(status: &OllamaStatus, progress: &mut Progress<W>) -> io::Result<()> {
    match status {
        OllamaStatus::Available { models } if models.is_empty() => {
            progress.warn("ollama is running but has no models; fallback messages will be used")
        }
        OllamaStatus::Available { models } => {
            progress.ok(&format!("ollama available ({} model(s))", models.len()))
        }
        OllamaStatus::NotInstalled => {
            progress.note("ollama not found; fallback messages will be used")
        }
        OllamaStatus::Unresponsive { detail } => progress.note(&format!(
            "ollama did not respond ({detail}); fallback messages will be used"
        )),
        OllamaStatus::Skipped => Ok(()),
    }
}

fn finish<W: Write>(warnings: usize, done: &str, progress: &mut Progress<W>) -> io::Result<()> {
    if warnings == 0 {
        progress.ok(done)
    } else {
        progress.warn(&format!("{done}; completed with {warnings} warning(s)"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SettingsState {
    Missing,
    Malformed { detail: String },
    Present,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventStatus {
    pub event: EventName,
    pub registered: bool,
    /// The exact command for this install location is among `commands`.
    pub current: bool,
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub layout: ScopeLayout,
    pub settings_path: PathBuf,
    pub settings: SettingsState,
    pub events: Vec<EventStatus>,
    pub backups: usize,
    pub groups: Vec<GroupInventory>,
    pub ollama: OllamaStatus,
}

pub fn collect_status(layout: &ScopeLayout, probe_ollama: bool) -> Result<StatusReport, AppError> {
    let manifest = InstallManifest::builtin()?;
    let settings_path = layout.settings_path();
    let hooks_dir = hooks_dir(layout, &manifest)?;
    let owned = OwnedHooks::for_hooks_dir(&hooks_dir);
    let patterns = RemovalPatterns::for_hooks_dir(&hooks_dir);

    let (state, doc) = match settings::inspect(&settings_path) {
        Ok(Some(doc)) => (SettingsState::Present, Some(doc)),
        Ok(None) => (SettingsState::Missing, None),
        Err(SettingsError::Malformed { detail, .. }) => (SettingsState::Malformed { detail }, None),
        Err(err) => return Err(err.into()),
    };

    let events = EventName::ALL
        .into_iter()
        .map(|event| {
            let commands = doc
                .as_ref()
                .map(|doc| {
                    registered_commands(doc, event.as_str())
                        .into_iter()
                        .filter(|command| patterns.is_owned(command))
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let current = owned
                .command_for(event)
                .is_some_and(|expected| commands.iter().any(|command| command == expected));
            EventStatus {
                event,
                registered: !commands.is_empty(),
                current,
                commands,
            }
        })
        .collect();

    let ollama = if probe_ollama {
        ollama::probe()
    } else {
        OllamaStatus::Skipped
    };

    Ok(StatusReport {
        layout: layout.clone(),
        backups: settings::list_backups(&settings_path)?.len(),
        settings_path,
        settings: state,
        events,
        groups: provision::inventory(layout, &manifest),
        ollama,
    })
}

pub fn print_status<W: Write>(report: &StatusReport, progress: &mut Progress<W>) -> io::Result<()> {
    progress.heading(&format!(
        "mood-lifter status ({}: {})",
        report.layout.scope,
        report.layout.root.display()
    ))?;

    match &report.settings {
        SettingsState::Missing => {
            progress.missing(&format!("{} does not exist", report.settings_path.display()))?
        }
        SettingsState::Malformed { detail } => progress.warn(&format!(
            "{} is malformed: {detail}",
            report.settings_path.display()
        ))?,
        SettingsState::Present => {
            for event in &report.events {
                if event.current {
                    progress.ok(&format!("{} hook registered", event.event))?;
                } else if event.registered {
                    progress.warn(&format!(
                        "{} hook registered from another location; reinstall to update it",
                        event.event
                    ))?;
                } else {
                    progress.missing(&format!("{} hook not registered", event.event))?;
                }
            }
        }
    }
    if report.backups > 0 {
        progress.note(&format!("{} settings backup(s) on disk", report.backups))?;
    }

    for group in &report.groups {
        let total = group.present.len() + group.missing.len();
        let line = format!(
            "{}: {}/{} file(s) in {}",
            group.group,
            group.present.len(),
            total,
            group.dir.display()
        );
        if group.missing.is_empty() {
            progress.ok(&line)?;
        } else if group.present.is_empty() {
            progress.missing(&line)?;
        } else {
            progress.warn(&line)?;
        }
    }

    report_ollama(&report.ollama, progress)
}

#[cfg(test)]
#[path = "app_tests_ext.rs"]
mod tests_ext;
