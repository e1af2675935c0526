//! Copies manifest assets into a scope and deletes them again.
//!
//! Every file is handled on its own: one failed copy or delete becomes a
//! warning and the rest of the run continues. Only names listed in the
//! manifest are ever deleted.

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::layout::ScopeLayout;
use crate::manifest::{AssetGroup, InstallManifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    All,
    HooksOnly,
    CommandsOnly,
}

/// Which asset groups a run touches and whether it edits the settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSelection {
    pub groups: Vec<AssetGroup>,
    pub settings: bool,
    /// Directories removed afterwards if they were left empty.
    pub prune_dirs: Vec<AssetGroup>,
}

impl GroupSelection {
    pub fn for_install(focus: Focus) -> Self {
        let (groups, settings) = match focus {
            Focus::All => (AssetGroup::ALL.to_vec(), true),
            Focus::HooksOnly => (
                vec![AssetGroup::Hooks, AssetGroup::Library, AssetGroup::Defaults],
                true,
            ),
            Focus::CommandsOnly => (vec![AssetGroup::Commands, AssetGroup::Library], false),
        };
        Self {
            groups,
            settings,
            prune_dirs: Vec::new(),
        }
    }

    pub fn for_uninstall(focus: Focus, complete: bool) -> Self {
        let (mut groups, settings) = match focus {
            Focus::All => (vec![AssetGroup::Hooks, AssetGroup::Commands], true),
            Focus::HooksOnly => (vec![AssetGroup::Hooks], true),
            Focus::CommandsOnly => (vec![AssetGroup::Commands], false),
        };
        let mut prune_dirs = Vec::new();
        if complete {
            groups.extend([AssetGroup::Library, AssetGroup::Defaults]);
            prune_dirs.extend([AssetGroup::Library, AssetGroup::Defaults]);
        }
        Self {
            groups,
            settings,
            prune_dirs,
        }
    }

    pub fn includes(&self, group: AssetGroup) -> bool {
        self.groups.contains(&group)
    }
}

#[derive(Debug)]
pub enum ProvisionError {
    MissingSource(PathBuf),
    DirectoryCreate { path: PathBuf, source: io::Error },
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::MissingSource(path) => {
                write!(f, "required source directory missing: {}", path.display())
            }
            ProvisionError::DirectoryCreate { path, source } => write!(
                f,
                "cannot create destination directory {}: {}",
                path.display(),
                source
            ),
        }
    }
}

impl Error for ProvisionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProvisionError::MissingSource(_) => None,
            ProvisionError::DirectoryCreate { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProvisionWarning {
    CopyFailure {
        from: PathBuf,
        to: PathBuf,
        detail: String,
    },
    RemoveFailure {
        path: PathBuf,
        detail: String,
    },
}

impl fmt::Display for ProvisionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionWarning::CopyFailure { from, to, detail } => write!(
                f,
                "failed to copy {} to {}: {}",
                from.display(),
                to.display(),
                detail
            ),
            ProvisionWarning::RemoveFailure { path, detail } => {
                write!(f, "failed to remove {}: {}", path.display(), detail)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCopy {
    pub group: AssetGroup,
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub copied: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// Listed files that were already gone on uninstall.
    pub absent: Vec<PathBuf>,
    pub removed_dirs: Vec<PathBuf>,
    /// Directories left in place because something else still lives there.
    pub kept_dirs: Vec<PathBuf>,
    pub warnings: Vec<ProvisionWarning>,
}

/// Fails before anything is created if the source tree cannot serve `selection`.
pub fn check_sources(
    source_root: &Path,
    manifest: &InstallManifest,
    selection: &GroupSelection,
) -> Result<(), ProvisionError> {
    if !source_root.is_dir() {
        return Err(ProvisionError::MissingSource(source_root.to_path_buf()));
    }
    for group in manifest.groups() {
        if !selection.includes(group.id) {
            continue;
        }
        let dir = source_root.join(&group.source_dir);
        if !dir.is_dir() {
            return Err(ProvisionError::MissingSource(dir));
        }
    }
    Ok(())
}

/// Creates the scope root and every selected group directory.
pub fn prepare_destination(
    layout: &ScopeLayout,
    manifest: &InstallManifest,
    selection: &GroupSelection,
) -> Result<(), ProvisionError> {
    create_dir(&layout.root)?;
    for group in manifest.groups() {
        if selection.includes(group.id) {
            create_dir(&layout.group_dir(group))?;
        }
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), ProvisionError> {
    fs::create_dir_all(path).map_err(|source| ProvisionError::DirectoryCreate {
        path: path.to_path_buf(),
        source,
    })
}

pub fn plan_copies(
    source_root: &Path,
    layout: &ScopeLayout,
    manifest: &InstallManifest,
    selection: &GroupSelection,
) -> Vec<PlannedCopy> {
    let mut planned = Vec::new();
    for group in manifest.groups() {
        if !selection.includes(group.id) {
            continue;
        }
        let from_dir = source_root.join(&group.source_dir);
        let to_dir = layout.group_dir(group);
        for name in &group.files {
            planned.push(PlannedCopy {
                group: group.id,
                from: from_dir.join(name),
                to: to_dir.join(name),
            });
        }
    }
    planned
}

/// Listed files of the selected groups that currently exist in the scope.
pub fn plan_removals(
    layout: &ScopeLayout,
    manifest: &InstallManifest,
    selection: &GroupSelection,
) -> Vec<PathBuf> {
    manifest
        .groups()
        .iter()
        .filter(|group| selection.includes(group.id))
        .flat_map(|group| {
            let dir = layout.group_dir(group);
            group.files.iter().map(move |name| dir.join(name))
        })
        .filter(|path| path.exists())
        .collect()
}

pub fn provision(
    source_root: &Path,
    layout: &ScopeLayout,
    manifest: &InstallManifest,
    selection: &GroupSelection,
) -> ProvisionReport {
    let mut report = ProvisionReport::default();
    for copy in plan_copies(source_root, layout, manifest, selection) {
        match fs::copy(&copy.from, &copy.to) {
            Ok(bytes) => {
                tracing::debug!(
                    group = %copy.group,
                    to = %copy.to.display(),
                    bytes,
                    "copied asset"
                );
                report.copied.push(copy.to);
            }
            Err(err) => {
                tracing::debug!(from = %copy.from.display(), error = %err, "copy failed");
                report.warnings.push(ProvisionWarning::CopyFailure {
                    from: copy.from,
                    to: copy.to,
                    detail: err.to_string(),
                });
            }
        }
    }
    report
}

pub fn deprovision(
    layout: &ScopeLayout,
    manifest: &InstallManifest,
    selection: &GroupSelection,
) -> ProvisionReport {
    let mut report = ProvisionReport::default();
    for group in manifest.groups() {
        if !selection.includes(group.id) {
            continue;
        }
        let dir = layout.group_dir(group);
        for name in &group.files {
            let path = dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(group = %group.id, path = %path.display(), "removed asset");
                    report.removed.push(path);
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => report.absent.push(path),
                Err(err) => report.warnings.push(ProvisionWarning::RemoveFailure {
                    path,
                    detail: err.to_string(),
                }),
            }
        }
    }

    for group in manifest.groups() {
        if selection.prune_dirs.contains(&group.id) {
            prune_if_empty(&layout.group_dir(group), &mut report);
        }
    }
    report
}

fn prune_if_empty(dir: &Path, report: &mut ProvisionReport) {
    let mut entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return,
        Err(err) => {
            report.warnings.push(ProvisionWarning::RemoveFailure {
                path: dir.to_path_buf(),
                detail: err.to_string(),
            });
            return;
        }
    };
    if entries.next().is_some() {
        tracing::debug!(dir = %dir.display(), "directory not empty; keeping it");
        report.kept_dirs.push(dir.to_path_buf());
        return;
    }
    match fs::remove_dir(dir) {
        Ok(()) => report.removed_dirs.push(dir.to_path_buf()),
        Err(err) => report.warnings.push(ProvisionWarning::RemoveFailure {
            path: dir.to_path_buf(),
            detail: err.to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupInventory {
    pub group: AssetGroup,
    pub dir: PathBuf,
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

/// Which manifest files exist in the scope, group by group.
pub fn inventory(layout: &ScopeLayout, manifest: &InstallManifest) -> Vec<GroupInventory> {
    manifest
        .groups()
        .iter()
        .map(|group| {
            let dir = layout.group_dir(group);
            let (present, missing): (Vec<String>, Vec<String>) = group
                .files
                .iter()
                .cloned()
                .partition(|name| dir.join(name).is_file());
            GroupInventory {
                group: group.id,
                dir,
                present,
                missing,
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "provision_tests_ext.rs"]
mod tests_ext;
