//! Load, back up, and atomically save the host's `settings.json`.
//!
//! The document is kept as an untyped [`serde_json::Value`] tree so keys this
//! crate does not understand survive every round trip, in their original order.

use std::error::Error;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::locks::{FileLock, LockError, SETTINGS_LOCK_TIMEOUT};

pub const SETTINGS_FILE_NAME: &str = "settings.json";
const BACKUP_MARKER: &str = ".backup.";

#[derive(Debug)]
pub enum SettingsError {
    Io { path: PathBuf, source: io::Error },
    Malformed { path: PathBuf, detail: String },
    Lock(LockError),
    ConcurrentModification(PathBuf),
    Serialize(serde_json::Error),
}

impl SettingsError {
    fn io(path: &Path, source: io::Error) -> Self {
        SettingsError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn malformed(path: &Path, detail: impl Into<String>) -> Self {
        SettingsError::Malformed {
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            SettingsError::Malformed { path, detail } => write!(
                f,
                "malformed settings document {}: {} (file left unchanged)",
                path.display(),
                detail
            ),
            SettingsError::Lock(err) => write!(f, "{}", err),
            SettingsError::ConcurrentModification(path) => write!(
                f,
                "{} changed on disk while it was being updated; nothing was written, \
                 re-run the command",
                path.display()
            ),
            SettingsError::Serialize(err) => write!(f, "failed to serialize settings: {}", err),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SettingsError::Io { source, .. } => Some(source),
            SettingsError::Lock(err) => Some(err),
            SettingsError::Serialize(err) => Some(err),
            SettingsError::Malformed { .. } | SettingsError::ConcurrentModification(_) => None,
        }
    }
}

impl From<LockError> for SettingsError {
    fn from(value: LockError) -> Self {
        SettingsError::Lock(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Unchanged,
    Written { backup: Option<PathBuf> },
}

#[derive(Debug)]
pub struct Reconciled<T> {
    pub outcome: SaveOutcome,
    pub report: T,
}

pub fn empty_document() -> Value {
    Value::Object(Map::new())
}

/// Missing files load as an empty document; unparsable ones are an error.
pub fn load(path: &Path) -> Result<Value, SettingsError> {
    let snapshot = read_snapshot(path)?;
    parse_document(path, snapshot.as_deref())
}

/// Like [`load`], but tells a missing file apart from an empty one.
pub fn inspect(path: &Path) -> Result<Option<Value>, SettingsError> {
    match read_snapshot(path)? {
        Some(bytes) => parse_document(path, Some(&bytes)).map(Some),
        None => Ok(None),
    }
}

pub fn render(doc: &Value) -> Result<String, SettingsError> {
    let mut rendered = serde_json::to_string_pretty(doc).map_err(SettingsError::Serialize)?;
    rendered.push('\n');
    Ok(rendered)
}

/// Backs up any existing file, then replaces it atomically.
///
/// A symlinked `path` stays a link: the rename lands on the file it points at.
pub fn save(path: &Path, doc: &Value) -> Result<Option<PathBuf>, SettingsError> {
    let rendered = render(doc)?;
    let target = write_target(path).map_err(|err| SettingsError::io(path, err))?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|err| SettingsError::io(parent, err))?;
    }
    let backup = backup(path)?;
    write_atomic(&target, rendered.as_bytes())?;
    tracing::debug!(
        path = %path.display(),
        target = %target.display(),
        bytes = rendered.len(),
        "saved settings"
    );
    Ok(backup)
}

pub fn backup(path: &Path) -> Result<Option<PathBuf>, SettingsError> {
    if !path.exists() {
        return Ok(None);
    }
    let target = next_backup_path(path, &filename_timestamp());
    fs::copy(path, &target).map_err(|err| SettingsError::io(&target, err))?;
    tracing::debug!(backup = %target.display(), "backed up settings");
    Ok(Some(target))
}

/// Runs one locked load → transform → save cycle.
///
/// Nothing is written when the transform leaves the document unchanged. The
/// file is fingerprinted at load time and checked again right before the
/// write; a mismatch aborts with [`SettingsError::ConcurrentModification`]
/// instead of replaying the transform over someone else's changes.
pub fn reconcile<T, F>(path: &Path, transform: F) -> Result<Reconciled<T>, SettingsError>
where
    F: FnOnce(&Value) -> Result<(Value, T), SettingsError>,
{
    let lock_path = FileLock::path_for(path);
    let mut guard = match path.parent() {
        Some(dir) if dir.is_dir() => Some(FileLock::acquire(&lock_path, SETTINGS_LOCK_TIMEOUT)?),
        _ => None,
    };

    let snapshot = read_snapshot(path)?;
    let loaded_fingerprint = fingerprint(snapshot.as_deref());
    let current = parse_document(path, snapshot.as_deref())?;
    let (next, report) = transform(&current)?;
    if next == current {
        tracing::debug!(path = %path.display(), "settings already up to date");
        return Ok(Reconciled {
            outcome: SaveOutcome::Unchanged,
            report,
        });
    }

    if guard.is_none() {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|err| SettingsError::io(dir, err))?;
        }
        guard = Some(FileLock::acquire(&lock_path, SETTINGS_LOCK_TIMEOUT)?);
    }

    let on_disk = read_snapshot(path)?;
    if fingerprint(on_disk.as_deref()) != loaded_fingerprint {
        return Err(SettingsError::ConcurrentModification(path.to_path_buf()));
    }

    let backup = save(path, &next)?;
    drop(guard);
    Ok(Reconciled {
        outcome: SaveOutcome::Written { backup },
        report,
    })
}

fn read_snapshot(path: &Path) -> Result<Option<Vec<u8>>, SettingsError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(SettingsError::io(path, err)),
    }
}

fn parse_document(path: &Path, bytes: Option<&[u8]>) -> Result<Value, SettingsError> {
    let Some(bytes) = bytes else {
        return Ok(empty_document());
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(empty_document());
    }

    let value: Value = serde_json::from_slice(bytes)
        .map_err(|err| SettingsError::malformed(path, err.to_string()))?;
    if !value.is_object() {
        return Err(SettingsError::malformed(
            path,
            "top-level value must be a JSON object",
        ));
    }
    Ok(value)
}

fn fingerprint(bytes: Option<&[u8]>) -> Option<String> {
    bytes.map(|bytes| {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    })
}

/// The regular file a write to `path` should replace.
fn write_target(path: &Path) -> io::Result<PathBuf> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_symlink() => match fs::canonicalize(path) {
            Ok(resolved) => Ok(resolved),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // Dangling link: create the file it names.
                let link = fs::read_link(path)?;
                Ok(match path.parent() {
                    Some(parent) if link.is_relative() => parent.join(link),
                    _ => link,
                })
            }
            Err(err) => Err(err),
        },
        Ok(_) => Ok(path.to_path_buf()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(err) => Err(err),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SettingsError> {
    let temp = temp_path_for(path);
    if let Err(err) = write_then_rename(&temp, path, bytes) {
        let _ = fs::remove_file(&temp);
        return Err(SettingsError::io(path, err));
    }
    Ok(())
}

fn write_then_rename(temp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(temp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp, metadata.permissions())?;
    }
    fs::rename(temp, path)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or(SETTINGS_FILE_NAME);
    path.with_file_name(format!(".{name}.tmp-{}", Uuid::now_v7().simple()))
}

pub(crate) fn backup_path(path: &Path, stamp: &str) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or(SETTINGS_FILE_NAME);
    path.with_file_name(format!("{name}{BACKUP_MARKER}{stamp}"))
}

fn next_backup_path(path: &Path, stamp: &str) -> PathBuf {
    let first = backup_path(path, stamp);
    if !first.exists() {
        return first;
    }
    let mut counter = 1_u32;
    loop {
        let candidate = backup_path(path, &format!("{stamp}-{counter}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Lists backups of `path`, oldest first.
pub fn list_backups(path: &Path) -> Result<Vec<PathBuf>, SettingsError> {
    let Some(dir) = path.parent() else {
        return Ok(Vec::new());
    };
    let Some(name) = path.file_name().and_then(|value| value.to_str()) else {
        return Ok(Vec::new());
    };
    let prefix = format!("{name}{BACKUP_MARKER}");

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(SettingsError::io(dir, err)),
    };

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| SettingsError::io(dir, err))?;
        let candidate = entry.path();
        let matches = candidate
            .file_name()
            .and_then(|value| value.to_str())
            .is_some_and(|value| value.starts_with(&prefix));
        if matches && candidate.is_file() {
            backups.push(candidate);
        }
    }
    backups.sort();
    Ok(backups)
}

fn filename_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

#[cfg(test)]
#[path = "settings_tests_ext.rs"]
mod tests_ext;
