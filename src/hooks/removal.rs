use serde::Serialize;
use serde_json::Value;

use super::identity::RemovalPatterns;
use super::{invocation_command, GROUP_INVOCATIONS_KEY, REGISTRY_KEY};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
    pub removed: usize,
    pub pruned_events: Vec<String>,
    pub registry_pruned: bool,
}

impl RemovalReport {
    pub fn changed(&self) -> bool {
        self.removed > 0
    }
}

/// Strips owned invocations from every event in the registry.
///
/// Works per invocation: a group that mixes owned and foreign invocations
/// keeps the foreign ones and its other keys. Groups, events, and the registry
/// itself are pruned only when this pass emptied them. Values that are not
/// shaped like a registry are left exactly as found.
pub fn remove_owned_hooks(doc: &Value, patterns: &RemovalPatterns) -> (Value, RemovalReport) {
    let mut next = doc.clone();
    let mut report = RemovalReport::default();

    let Some(root) = next.as_object_mut() else {
        return (next, report);
    };
    let Some(registry) = root.get_mut(REGISTRY_KEY).and_then(Value::as_object_mut) else {
        return (next, report);
    };

    let mut emptied = Vec::new();
    for (event, groups) in registry.iter_mut() {
        let Some(groups) = groups.as_array_mut() else {
            continue;
        };
        let removed = strip_groups(groups, patterns);
        if removed == 0 {
            continue;
        }
        report.removed += removed;
        if groups.is_empty() {
            emptied.push(event.clone());
        }
    }

    for event in &emptied {
        registry.shift_remove(event);
    }
    report.pruned_events = emptied;

    if !report.pruned_events.is_empty() && registry.is_empty() {
        root.shift_remove(REGISTRY_KEY);
        report.registry_pruned = true;
    }

    tracing::debug!(
        removed = report.removed,
        pruned_events = report.pruned_events.len(),
        registry_pruned = report.registry_pruned,
        "removed owned hooks"
    );
    (next, report)
}

fn strip_groups(groups: &mut Vec<Value>, patterns: &RemovalPatterns) -> usize {
    let mut removed = 0;
    groups.retain_mut(|group| {
        let Some(invocations) = group
            .get_mut(GROUP_INVOCATIONS_KEY)
            .and_then(Value::as_array_mut)
        else {
            return true;
        };
        let before = invocations.len();
        invocations.retain(|invocation| {
            !invocation_command(invocation).is_some_and(|command| patterns.is_owned(command))
        });
        let stripped = before - invocations.len();
        removed += stripped;
        stripped == 0 || !invocations.is_empty()
    });
    removed
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde_json::json;

    use super::{remove_owned_hooks, RemovalReport};
    use crate::hooks::{merge_owned_hooks, OwnedHooks, RemovalPatterns};

    const HOOKS_DIR: &str = "/home/dev/.claude/hooks";

    fn patterns() -> RemovalPatterns {
        RemovalPatterns::for_hooks_dir(Path::new(HOOKS_DIR))
    }

    #[test]
    fn install_then_remove_restores_original_document() {
        let original = json!({"model": "opus", "permissions": {"allow": []}});
        let owned = OwnedHooks::for_hooks_dir(Path::new(HOOKS_DIR));
        let (installed, _) = merge_owned_hooks(&original, &owned).expect("merge");
        let (restored, report) = remove_owned_hooks(&installed, &patterns());
        assert_eq!(restored, original);
        assert_eq!(report.removed, 3);
        assert_eq!(report.pruned_events.len(), 3);
        assert!(report.registry_pruned);
    }

    #[test]
    fn foreign_events_and_groups_survive() {
        let doc = json!({
            "hooks": {
                "Stop": [
                    {"hooks": [{"type": "command", "command": "afplay done.aiff"}]},
                    {"hooks": [{"type": "command", "command": "python3 /home/dev/.claude/hooks/stop.py"}]}
                ],
                "SessionStart": [
                    {"hooks": [{"type": "command", "command": "python3 /home/dev/.claude/hooks/sessionstart.py"}]}
                ],
                "PreToolUse": [{"hooks": [{"type": "command", "command": "lint"}]}]
            }
        });
        let (next, report) = remove_owned_hooks(&doc, &patterns());
        assert_eq!(report.removed, 2);
        assert_eq!(report.pruned_events, vec!["SessionStart".to_string()]);
        assert!(!report.registry_pruned);
        assert_eq!(
            next,
            json!({
                "hooks": {
                    "Stop": [{"hooks": [{"type": "command", "command": "afplay done.aiff"}]}],
                    "PreToolUse": [{"hooks": [{"type": "command", "command": "lint"}]}]
                }
            })
        );
    }

    #[test]
    fn mixed_group_keeps_foreign_invocation_and_matcher() {
        let doc = json!({
            "hooks": {
                "Notification": [{
                    "matcher": "idle",
                    "hooks": [
                        {"type": "command", "command": "python3 /elsewhere/hooks/notification.py"},
                        {"type": "command", "command": "notify-send hi"}
                    ]
                }]
            }
        });
        let (next, report) = remove_owned_hooks(&doc, &patterns());
        assert_eq!(report.removed, 1);
        assert!(report.pruned_events.is_empty());
        assert_eq!(
            next["hooks"]["Notification"],
            json!([{"matcher": "idle", "hooks": [{"type": "command", "command": "notify-send hi"}]}])
        );
    }

    #[test]
    fn removing_twice_is_a_no_op() {
        let doc = json!({
            "hooks": {"Stop": [{"hooks": [{"type": "command", "command": "python3 stop.py"}]}]}
        });
        let (once, first) = remove_owned_hooks(&doc, &patterns());
        assert!(first.changed());
        let (twice, second) = remove_owned_hooks(&once, &patterns());
        assert_eq!(once, twice);
        assert_eq!(second, RemovalReport::default());
    }

    #[test]
    fn pre_existing_empty_structures_are_left_alone() {
        let doc = json!({
            "hooks": {
                "Stop": [],
                "PreToolUse": [{"hooks": []}]
            }
        });
        let (next, report) = remove_owned_hooks(&doc, &patterns());
        assert_eq!(next, doc);
        assert!(!report.changed());

        let empty_registry = json!({"hooks": {}});
        let (next, _) = remove_owned_hooks(&empty_registry, &patterns());
        assert_eq!(next, empty_registry);
    }

    #[test]
    fn unexpected_shapes_are_not_touched() {
        for doc in [
            json!({"hooks": ["python3 stop.py"]}),
            json!({"hooks": {"Stop": "python3 stop.py"}}),
            json!({"hooks": {"Stop": [{"hooks": "python3 stop.py"}]}}),
        ] {
            let (next, report) = remove_owned_hooks(&doc, &patterns());
            assert_eq!(next, doc);
            assert_eq!(report.removed, 0);
        }
    }

    #[test]
    fn other_sections_keep_their_key_order() {
        let doc = json!({
            "zeta": 1,
            "hooks": {"Stop": [{"hooks": [{"type": "command", "command": "python3 /x/stop.py"}]}]},
            "alpha": 2
        });
        let (next, _) = remove_owned_hooks(&doc, &patterns());
        let keys: Vec<&String> = next.as_object().expect("object").keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }
}
