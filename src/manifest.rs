use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

const MANIFEST_TOML: &str = include_str!("manifest.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetGroup {
    Commands,
    Hooks,
    Library,
    Defaults,
}

impl AssetGroup {
    pub const ALL: [AssetGroup; 4] = [
        AssetGroup::Commands,
        AssetGroup::Hooks,
        AssetGroup::Library,
        AssetGroup::Defaults,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetGroup::Commands => "commands",
            AssetGroup::Hooks => "hooks",
            AssetGroup::Library => "library",
            AssetGroup::Defaults => "defaults",
        }
    }
}

impl fmt::Display for AssetGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub id: AssetGroup,
    pub source_dir: String,
    pub dest_dir: String,
    pub files: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawManifestFile {
    #[serde(default)]
    groups: Vec<GroupSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallManifest {
    groups: Vec<GroupSpec>,
}

#[derive(Debug)]
pub enum ManifestError {
    Toml(toml::de::Error),
    InvalidDefinition(String),
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Toml(err) => write!(f, "invalid install manifest TOML: {}", err),
            ManifestError::InvalidDefinition(message) => {
                write!(f, "invalid install manifest: {}", message)
            }
        }
    }
}

impl Error for ManifestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ManifestError::Toml(err) => Some(err),
            ManifestError::InvalidDefinition(_) => None,
        }
    }
}

impl From<toml::de::Error> for ManifestError {
    fn from(value: toml::de::Error) -> Self {
        ManifestError::Toml(value)
    }
}

impl InstallManifest {
    pub fn builtin() -> Result<Self, ManifestError> {
        Self::from_toml(MANIFEST_TOML)
    }

    pub(crate) fn from_toml(raw: &str) -> Result<Self, ManifestError> {
        let file: RawManifestFile = toml::from_str(raw)?;

        let mut seen = HashSet::new();
        for group in &file.groups {
            if !seen.insert(group.id) {
                return Err(invalid(format!("group '{}' is defined twice", group.id)));
            }
            validate_group(group)?;
        }
        if let Some(missing) = AssetGroup::ALL.iter().find(|id| !seen.contains(*id)) {
            return Err(invalid(format!("group '{missing}' is missing")));
        }

        Ok(Self { groups: file.groups })
    }

    pub fn groups(&self) -> &[GroupSpec] {
        &self.groups
    }

    pub fn group(&self, id: AssetGroup) -> Option<&GroupSpec> {
        self.groups.iter().find(|group| group.id == id)
    }
}

fn validate_group(group: &GroupSpec) -> Result<(), ManifestError> {
    for dir in [&group.source_dir, &group.dest_dir] {
        if !is_relative_subdir(dir) {
            return Err(invalid(format!(
                "group '{}' directory '{}' must be a relative path without '..'",
                group.id, dir
            )));
        }
    }
    if group.files.is_empty() {
        return Err(invalid(format!("group '{}' lists no files", group.id)));
    }

    let mut names = HashSet::new();
    for name in &group.files {
        if !is_plain_file_name(name) {
            return Err(invalid(format!(
                "group '{}' entry '{}' must be a bare file name",
                group.id, name
            )));
        }
        if !names.insert(name.as_str()) {
            return Err(invalid(format!(
                "group '{}' lists '{}' twice",
                group.id, name
            )));
        }
    }
    Ok(())
}

fn is_relative_subdir(raw: &str) -> bool {
    let path = Path::new(raw);
    !raw.trim().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

fn is_plain_file_name(raw: &str) -> bool {
    !raw.is_empty()
        && raw != "."
        && raw != ".."
        && !raw.contains(['/', '\\'])
        && raw.trim() == raw
}

fn invalid(message: String) -> ManifestError {
    ManifestError::InvalidDefinition(message)
}
