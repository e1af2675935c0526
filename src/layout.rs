use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::manifest::GroupSpec;
use crate::settings::SETTINGS_FILE_NAME;

pub const CONFIG_SUBDIR: &str = ".claude";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "dir", rename_all = "snake_case")]
pub enum Scope {
    User,
    Project(PathBuf),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::User => f.write_str("user"),
            Scope::Project(dir) => write!(f, "project {}", dir.display()),
        }
    }
}

/// Where one scope's files live on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeLayout {
    pub scope: Scope,
    pub root: PathBuf,
}

impl ScopeLayout {
    pub fn user(root: PathBuf) -> Self {
        Self {
            scope: Scope::User,
            root,
        }
    }

    pub fn project(dir: PathBuf) -> Self {
        let root = dir.join(CONFIG_SUBDIR);
        Self {
            scope: Scope::Project(dir),
            root,
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE_NAME)
    }

    pub fn group_dir(&self, group: &GroupSpec) -> PathBuf {
        self.root.join(&group.dest_dir)
    }
}

/// `$CLAUDE_CONFIG_DIR` when given, otherwise `$HOME/.claude`.
pub fn user_root(config_dir: Option<&Path>, home: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = config_dir.filter(|dir| !dir.as_os_str().is_empty()) {
        return Some(dir.to_path_buf());
    }
    home.filter(|home| !home.as_os_str().is_empty())
        .map(|home| home.join(CONFIG_SUBDIR))
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Resolves a `--project` argument to an absolute, existing directory.
pub fn resolve_project_dir(raw: &Path) -> io::Result<PathBuf> {
    let resolved = std::fs::canonicalize(raw)?;
    if !resolved.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a directory", resolved.display()),
        ));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use uuid::Uuid;

    use super::{resolve_project_dir, user_root, Scope, ScopeLayout};
    use crate::manifest::{AssetGroup, InstallManifest};

    #[test]
    fn user_root_prefers_explicit_config_dir() {
        assert_eq!(
            user_root(Some(Path::new("/cfg")), Some(Path::new("/home/dev"))),
            Some(PathBuf::from("/cfg"))
        );
        assert_eq!(
            user_root(Some(Path::new("")), Some(Path::new("/home/dev"))),
            Some(PathBuf::from("/home/dev/.claude"))
        );
        assert_eq!(user_root(None, None), None);
    }

    #[test]
    fn project_layout_nests_under_config_subdir() {
        let layout = ScopeLayout::project(PathBuf::from("/work/app"));
        assert_eq!(layout.root, PathBuf::from("/work/app/.claude"));
        assert_eq!(
            layout.settings_path(),
            PathBuf::from("/work/app/.claude/settings.json")
        );
        assert_eq!(layout.scope, Scope::Project(PathBuf::from("/work/app")));

        let manifest = InstallManifest::builtin().expect("manifest");
        let library = manifest.group(AssetGroup::Library).expect("library");
        assert_eq!(layout.group_dir(library), PathBuf::from("/work/app/.claude/lib"));
    }

    #[test]
    fn project_dir_resolves_to_absolute_path() {
        let dir = std::env::temp_dir().join(format!("mood-lifter-layout-{}", Uuid::now_v7()));
        std::fs::create_dir_all(dir.join("nested")).expect("temp dir");
        let resolved = resolve_project_dir(&dir.join("nested").join("..")).expect("resolve");
        assert!(resolved.is_absolute());
        assert!(!resolved.ends_with(".."));

        let missing = resolve_project_dir(&dir.join("absent"));
        assert!(missing.is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
