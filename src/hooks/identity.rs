use std::path::{Path, PathBuf};

use super::EventName;

pub const INTERPRETER: &str = "python3";

/// Exact command strings this tool installs, one per event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedHooks {
    entries: Vec<(EventName, String)>,
}

impl OwnedHooks {
    pub fn for_hooks_dir(hooks_dir: &Path) -> Self {
        let entries = EventName::ALL
            .into_iter()
            .map(|event| (event, hook_command(&hooks_dir.join(event.script_name()))))
            .collect();
        Self { entries }
    }

    pub fn command_for(&self, event: EventName) -> Option<&str> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == event)
            .map(|(_, command)| command.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventName, &str)> {
        self.entries
            .iter()
            .map(|(event, command)| (*event, command.as_str()))
    }
}

/// The host runs hook commands through a shell, so any path that is not
/// plainly safe is double-quoted with `\`, `"`, `$` and `` ` `` escaped.
pub fn hook_command(script: &Path) -> String {
    let rendered = script.display().to_string();
    if needs_quoting(&rendered) {
        format!("{INTERPRETER} \"{}\"", escape_quoted(&rendered))
    } else {
        format!("{INTERPRETER} {rendered}")
    }
}

fn needs_quoting(path: &str) -> bool {
    path.is_empty() || !path.chars().all(is_plain_path_char)
}

fn is_plain_path_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '/' | '.' | '_' | '-' | '+' | ':' | ',' | '@' | '%' | '='
        )
}

fn escape_quoted(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for ch in path.chars() {
        if matches!(ch, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnedPattern {
    /// Absolute script path; matches anywhere in the command.
    Path(String),
    /// Bare script name; matches a command token whose last path component is
    /// exactly this name, so `nonstop.py` is not mistaken for `stop.py`.
    ScriptName(String),
}

impl OwnedPattern {
    pub fn matches(&self, command: &str) -> bool {
        match self {
            OwnedPattern::Path(path) => command.contains(path.as_str()),
            OwnedPattern::ScriptName(name) => command
                .split_whitespace()
                .map(|token| token.trim_matches(|ch| ch == '"' || ch == '\''))
                .filter_map(|token| token.rsplit(['/', '\\']).next())
                .any(|component| component == name),
        }
    }
}

/// Broader matcher used on uninstall, where the install location may have
/// moved or the command may have been edited by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalPatterns {
    patterns: Vec<OwnedPattern>,
}

impl RemovalPatterns {
    pub fn for_hooks_dir(hooks_dir: &Path) -> Self {
        let mut dirs = vec![hooks_dir.to_path_buf()];
        if let Ok(resolved) = std::fs::canonicalize(hooks_dir) {
            if resolved != hooks_dir {
                dirs.push(resolved);
            }
        }

        let mut patterns = Vec::new();
        for dir in &dirs {
            for event in EventName::ALL {
                let raw = script_path(dir, event);
                let escaped = escape_quoted(&raw);
                if escaped != raw {
                    patterns.push(OwnedPattern::Path(escaped));
                }
                patterns.push(OwnedPattern::Path(raw));
            }
        }
        for event in EventName::ALL {
            patterns.push(OwnedPattern::ScriptName(event.script_name().to_string()));
        }
        Self { patterns }
    }

    pub fn is_owned(&self, command: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(command))
    }
}

fn script_path(dir: &Path, event: EventName) -> String {
    let path: PathBuf = dir.join(event.script_name());
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{hook_command, OwnedHooks, OwnedPattern, RemovalPatterns};
    use crate::hooks::EventName;

    #[test]
    fn owned_hooks_point_at_scripts_in_hooks_dir() {
        let owned = OwnedHooks::for_hooks_dir(Path::new("/home/dev/.claude/hooks"));
        assert_eq!(
            owned.command_for(EventName::SessionStart),
            Some("python3 /home/dev/.claude/hooks/sessionstart.py")
        );
        assert_eq!(
            owned.command_for(EventName::Stop),
            Some("python3 /home/dev/.claude/hooks/stop.py")
        );
        assert_eq!(
            owned.command_for(EventName::Notification),
            Some("python3 /home/dev/.claude/hooks/notification.py")
        );
        assert_eq!(owned.iter().count(), 3);
    }

    #[test]
    fn hook_command_quotes_paths_with_spaces() {
        assert_eq!(
            hook_command(Path::new("/Users/Jo Dev/.claude/hooks/stop.py")),
            "python3 \"/Users/Jo Dev/.claude/hooks/stop.py\""
        );
    }

    #[test]
    fn hook_command_quotes_and_escapes_shell_metacharacters() {
        assert_eq!(
            hook_command(Path::new("/home/o'neil/.claude/hooks/stop.py")),
            "python3 \"/home/o'neil/.claude/hooks/stop.py\""
        );
        assert_eq!(
            hook_command(Path::new("/srv/$HOME (old)/a&b;c/hooks/stop.py")),
            "python3 \"/srv/\\$HOME (old)/a&b;c/hooks/stop.py\""
        );
        assert_eq!(
            hook_command(Path::new("/odd/\"quoted\"/`x`/stop.py")),
            "python3 \"/odd/\\\"quoted\\\"/\\`x\\`/stop.py\""
        );
        assert_eq!(
            hook_command(Path::new("/plain/hooks/stop.py")),
            "python3 /plain/hooks/stop.py"
        );
    }

    #[test]
    fn escaped_commands_are_still_owned() {
        let dir = Path::new("/srv/$release/.claude/hooks");
        let patterns = RemovalPatterns::for_hooks_dir(dir);
        let owned = OwnedHooks::for_hooks_dir(dir);
        for (_, command) in owned.iter() {
            assert!(patterns.is_owned(command), "{command} should be owned");
        }
        assert!(!patterns.is_owned("python3 /srv/other/.claude/hooks/stop.pyc"));
    }

    #[test]
    fn removal_patterns_match_install_commands_from_any_location() {
        let patterns = RemovalPatterns::for_hooks_dir(Path::new("/srv/current/.claude/hooks"));
        let current = OwnedHooks::for_hooks_dir(Path::new("/srv/current/.claude/hooks"));
        let moved = OwnedHooks::for_hooks_dir(Path::new("/old place/.claude/hooks"));
        for (_, command) in current.iter().chain(moved.iter()) {
            assert!(patterns.is_owned(command), "{command} should be owned");
        }
    }

    #[test]
    fn script_name_pattern_requires_whole_path_component() {
        let stop = OwnedPattern::ScriptName("stop.py".to_string());
        assert!(stop.matches("python3 /x/hooks/stop.py"));
        assert!(stop.matches("python3 stop.py --quiet"));
        assert!(stop.matches("python3 'C:\\hooks\\stop.py'"));
        assert!(!stop.matches("python3 /x/hooks/nonstop.py"));
        assert!(!stop.matches("python3 /x/stop.py.bak"));
    }

    #[test]
    fn path_pattern_is_a_substring_match() {
        let pattern = OwnedPattern::Path("/a/hooks/stop.py".to_string());
        assert!(pattern.matches("python3 \"/a/hooks/stop.py\" --flag"));
        assert!(!pattern.matches("python3 /b/hooks/stop.py"));
    }

    #[test]
    fn foreign_commands_are_not_owned() {
        let patterns = RemovalPatterns::for_hooks_dir(Path::new("/h/.claude/hooks"));
        assert!(!patterns.is_owned("afplay /System/Library/Sounds/Glass.aiff"));
        assert!(!patterns.is_owned("npx some-linter --fix"));
    }
}
