use serde::Serialize;
use serde_json::{Map, Value};

use super::identity::OwnedHooks;
use super::{
    group_invocations, invocation_command, single_invocation_group, EventName, ShapeError,
    REGISTRY_KEY,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub added: Vec<EventName>,
    pub already_present: Vec<EventName>,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        !self.added.is_empty()
    }
}

/// Appends each owned hook that is not yet registered under its event.
///
/// Existing groups are never reordered, rewritten, or dropped. A command that
/// already appears anywhere under its event counts as present, whichever
/// group holds it.
pub fn merge_owned_hooks(
    doc: &Value,
    owned: &OwnedHooks,
) -> Result<(Value, MergeReport), ShapeError> {
    let mut next = doc.clone();
    let mut report = MergeReport::default();

    let Some(root) = next.as_object_mut() else {
        return Err(ShapeError::new("<document>", "object"));
    };
    let registry = root
        .entry(REGISTRY_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(registry) = registry.as_object_mut() else {
        return Err(ShapeError::new(REGISTRY_KEY, "object"));
    };

    for (event, command) in owned.iter() {
        let groups = registry
            .entry(event.as_str())
            .or_insert_with(|| Value::Array(Vec::new()));
        let Some(groups) = groups.as_array_mut() else {
            return Err(ShapeError::new(
                format!("{REGISTRY_KEY}.{}", event.as_str()),
                "array",
            ));
        };

        if holds_command(groups, command) {
            report.already_present.push(event);
            continue;
        }
        groups.push(single_invocation_group(command));
        report.added.push(event);
    }

    tracing::debug!(
        added = report.added.len(),
        present = report.already_present.len(),
        "merged owned hooks"
    );
    Ok((next, report))
}

fn holds_command(groups: &[Value], command: &str) -> bool {
    groups
        .iter()
        .filter_map(group_invocations)
        .flatten()
        .filter_map(invocation_command)
        .any(|existing| existing == command)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde_json::json;

    use super::merge_owned_hooks;
    use crate::hooks::{registered_commands, EventName, OwnedHooks};

    fn owned() -> OwnedHooks {
        OwnedHooks::for_hooks_dir(Path::new("/home/dev/.claude/hooks"))
    }

    #[test]
    fn fresh_document_gains_one_group_per_event() {
        let (next, report) = merge_owned_hooks(&json!({}), &owned()).expect("merge");
        assert_eq!(report.added, EventName::ALL.to_vec());
        assert!(report.already_present.is_empty());
        assert_eq!(
            next,
            json!({
                "hooks": {
                    "SessionStart": [{"hooks": [{"type": "command", "command": "python3 /home/dev/.claude/hooks/sessionstart.py"}]}],
                    "Stop": [{"hooks": [{"type": "command", "command": "python3 /home/dev/.claude/hooks/stop.py"}]}],
                    "Notification": [{"hooks": [{"type": "command", "command": "python3 /home/dev/.claude/hooks/notification.py"}]}]
                }
            })
        );
    }

    #[test]
    fn merging_twice_is_a_no_op() {
        let (once, _) = merge_owned_hooks(&json!({"model": "opus"}), &owned()).expect("merge");
        let (twice, report) = merge_owned_hooks(&once, &owned()).expect("merge again");
        assert_eq!(once, twice);
        assert!(!report.changed());
        assert_eq!(report.already_present.len(), 3);
    }

    #[test]
    fn foreign_groups_are_kept_and_owned_group_goes_last() {
        let doc = json!({
            "permissions": {"allow": ["Bash(ls)"]},
            "hooks": {
                "Stop": [
                    {"matcher": "*", "hooks": [{"type": "command", "command": "afplay done.aiff"}]}
                ],
                "PreToolUse": [{"hooks": [{"type": "command", "command": "lint"}]}]
            }
        });
        let (next, report) = merge_owned_hooks(&doc, &owned()).expect("merge");
        assert_eq!(report.added.len(), 3);
        assert_eq!(next["permissions"], doc["permissions"]);
        assert_eq!(next["hooks"]["PreToolUse"], doc["hooks"]["PreToolUse"]);
        assert_eq!(
            registered_commands(&next, "Stop"),
            vec!["afplay done.aiff", "python3 /home/dev/.claude/hooks/stop.py"]
        );
        assert_eq!(next["hooks"]["Stop"][0]["matcher"], "*");
    }

    #[test]
    fn command_inside_a_shared_group_counts_as_present() {
        let doc = json!({
            "hooks": {
                "Stop": [{"hooks": [
                    {"type": "command", "command": "afplay done.aiff"},
                    {"type": "command", "command": "python3 /home/dev/.claude/hooks/stop.py"}
                ]}]
            }
        });
        let (next, report) = merge_owned_hooks(&doc, &owned()).expect("merge");
        assert_eq!(report.already_present, vec![EventName::Stop]);
        assert_eq!(next["hooks"]["Stop"], doc["hooks"]["Stop"]);
    }

    #[test]
    fn non_object_registry_is_a_shape_error() {
        let err = merge_owned_hooks(&json!({"hooks": []}), &owned()).expect_err("shape");
        assert_eq!(err.location, "hooks");
        assert!(err.to_string().contains("object"));
    }

    #[test]
    fn non_array_event_is_a_shape_error() {
        let doc = json!({"hooks": {"Stop": {"hooks": []}}});
        let err = merge_owned_hooks(&doc, &owned()).expect_err("shape");
        assert_eq!(err.location, "hooks.Stop");
    }
}
