//! Typed access to the `hooks` registry inside the host's settings document.
//!
//! Shape: `{"hooks": {"<Event>": [{"matcher"?: .., "hooks": [{"type": "command",
//! "command": ".."}]}]}}`. Everything outside the registry, and any key inside
//! it that is not listed here, is carried along untouched.

pub mod identity;
pub mod merge;
pub mod removal;

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{json, Value};

pub use identity::{OwnedHooks, RemovalPatterns};
pub use merge::{merge_owned_hooks, MergeReport};
pub use removal::{remove_owned_hooks, RemovalReport};

pub const REGISTRY_KEY: &str = "hooks";
pub const GROUP_INVOCATIONS_KEY: &str = "hooks";
pub const INVOCATION_KIND: &str = "command";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum EventName {
    SessionStart,
    Stop,
    Notification,
}

impl EventName {
    pub const ALL: [EventName; 3] = [
        EventName::SessionStart,
        EventName::Stop,
        EventName::Notification,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventName::SessionStart => "SessionStart",
            EventName::Stop => "Stop",
            EventName::Notification => "Notification",
        }
    }

    /// Hook script installed for this event.
    pub fn script_name(self) -> &'static str {
        match self {
            EventName::SessionStart => "sessionstart.py",
            EventName::Stop => "stop.py",
            EventName::Notification => "notification.py",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEventNameError(String);

impl fmt::Display for ParseEventNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown hook event '{}'", self.0)
    }
}

impl Error for ParseEventNameError {}

impl FromStr for EventName {
    type Err = ParseEventNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .into_iter()
            .find(|event| event.as_str() == value)
            .ok_or_else(|| ParseEventNameError(value.to_string()))
    }
}

/// A registry value that is not shaped the way the host defines it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError {
    pub location: String,
    pub expected: &'static str,
}

impl ShapeError {
    fn new(location: impl Into<String>, expected: &'static str) -> Self {
        Self {
            location: location.into(),
            expected,
        }
    }
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is not a JSON {}", self.location, self.expected)
    }
}

impl Error for ShapeError {}

pub fn invocation(command: &str) -> Value {
    json!({
        "type": INVOCATION_KIND,
        "command": command,
    })
}

pub fn single_invocation_group(command: &str) -> Value {
    json!({ GROUP_INVOCATIONS_KEY: [invocation(command)] })
}

pub fn invocation_command(invocation: &Value) -> Option<&str> {
    invocation.get("command").and_then(Value::as_str)
}

pub fn group_invocations(group: &Value) -> Option<&Vec<Value>> {
    group.get(GROUP_INVOCATIONS_KEY).and_then(Value::as_array)
}

/// Every command string registered under `event`, in document order.
pub fn registered_commands<'a>(doc: &'a Value, event: &str) -> Vec<&'a str> {
    doc.get(REGISTRY_KEY)
        .and_then(|registry| registry.get(event))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(group_invocations)
        .flatten()
        .filter_map(invocation_command)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{registered_commands, EventName};

    #[test]
    fn event_names_round_trip_through_strings() {
        for event in EventName::ALL {
            assert_eq!(event.as_str().parse::<EventName>(), Ok(event));
        }
        let err = "PreToolUse".parse::<EventName>().expect_err("unknown event");
        assert!(err.to_string().contains("PreToolUse"));
    }

    #[test]
    fn registered_commands_skips_entries_without_command_strings() {
        let doc = json!({
            "hooks": {
                "Stop": [
                    {"hooks": [{"type": "command", "command": "a"}, {"type": "command"}]},
                    {"matcher": "*"},
                    {"hooks": [{"type": "command", "command": "b"}]}
                ]
            }
        });
        assert_eq!(registered_commands(&doc, "Stop"), vec!["a", "b"]);
        assert!(registered_commands(&doc, "SessionStart").is_empty());
    }
}
