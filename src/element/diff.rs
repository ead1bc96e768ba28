//! Structural diff and patch of element values.
//!
//! Used to merge an adapter's authoritative post-deploy element into the
//! element instance already shared by the plan, without replacing it.

use super::change::ChangeAction;
use super::value::{Element, Value};

/// A single value difference at a nested path.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailedChange {
    /// Path of the value inside the element.
    pub path: Vec<String>,
    /// Kind of difference.
    pub action: ChangeAction,
    /// Value before, if any.
    pub before: Option<Value>,
    /// Value after, if any.
    pub after: Option<Value>,
}

/// Computes the differences turning `before` into `after`.
///
/// Maps are compared key by key; any other differing value is reported as a
/// single modification at its path.
#[must_use]
pub fn detailed_compare(before: &Value, after: &Value) -> Vec<DetailedChange> {
    let mut changes = Vec::new();
    compare_at(&mut Vec::new(), before, after, &mut changes);
    changes
}

fn compare_at(
    path: &mut Vec<String>,
    before: &Value,
    after: &Value,
    changes: &mut Vec<DetailedChange>,
) {
    match (before, after) {
        (Value::Map(before_map), Value::Map(after_map)) => {
            for (key, before_value) in before_map {
                path.push(key.clone());
                match after_map.get(key) {
                    Some(after_value) => compare_at(path, before_value, after_value, changes),
                    None => changes.push(DetailedChange {
                        path: path.clone(),
                        action: ChangeAction::Remove,
                        before: Some(before_value.clone()),
                        after: None,
                    }),
                }
                path.pop();
            }
            for (key, after_value) in after_map {
                if !before_map.contains_key(key) {
                    path.push(key.clone());
                    changes.push(DetailedChange {
                        path: path.clone(),
                        action: ChangeAction::Add,
                        before: None,
                        after: Some(after_value.clone()),
                    });
                    path.pop();
                }
            }
        }
        _ if before == after => {}
        _ => changes.push(DetailedChange {
            path: path.clone(),
            action: ChangeAction::Modify,
            before: Some(before.clone()),
            after: Some(after.clone()),
        }),
    }
}

/// Applies detailed changes to a value in place.
pub fn apply_detailed_changes(target: &mut Value, changes: &[DetailedChange]) {
    for change in changes {
        match (change.action, &change.after) {
            (ChangeAction::Remove, _) | (_, None) => {
                target.remove_path(&change.path);
            }
            (ChangeAction::Add | ChangeAction::Modify, Some(after)) => {
                target.set_path(&change.path, after.clone());
            }
        }
    }
}

/// Patches `target` in place so its value matches `updated`.
///
/// Returns the number of applied value differences.
pub fn merge_element(target: &mut Element, updated: &Element) -> usize {
    let changes = detailed_compare(&target.value, &updated.value);
    apply_detailed_changes(&mut target.value, &changes);
    changes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElemId;

    fn value(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn test_equal_values_have_no_changes() {
        let v = value(serde_json::json!({"a": 1, "b": {"c": [1, 2]}}));
        assert!(detailed_compare(&v, &v).is_empty());
    }

    #[test]
    fn test_compare_reports_nested_paths() {
        let before = value(serde_json::json!({
            "id": null,
            "settings": {"region": "eu", "old": true}
        }));
        let after = value(serde_json::json!({
            "id": 42,
            "settings": {"region": "eu", "tier": "gold"}
        }));

        let changes = detailed_compare(&before, &after);
        let summary: Vec<(String, ChangeAction)> = changes
            .iter()
            .map(|c| (c.path.join("."), c.action))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("id".to_string(), ChangeAction::Modify),
                ("settings.old".to_string(), ChangeAction::Remove),
                ("settings.tier".to_string(), ChangeAction::Add),
            ]
        );
    }

    #[test]
    fn test_apply_makes_values_equal() {
        let mut target = value(serde_json::json!({"id": null, "tags": ["a"], "gone": 1}));
        let updated = value(serde_json::json!({
            "id": "srv-1",
            "tags": ["a", "b"],
            "new": {"x": 1}
        }));

        let changes = detailed_compare(&target, &updated);
        apply_detailed_changes(&mut target, &changes);

        assert_eq!(target, updated);
    }

    #[test]
    fn test_merge_element_keeps_identity() {
        let id = ElemId::instance_id("salto", "Account", "acme");
        let mut target = Element::new(id.clone(), value(serde_json::json!({"id": null})));
        let updated = Element::new(id, value(serde_json::json!({"id": 42})));

        assert_eq!(merge_element(&mut target, &updated), 1);
        assert_eq!(target.value.get_path(&["id"]), Some(&Value::from(42)));
        assert_eq!(merge_element(&mut target, &updated), 0);
    }
}
