//! Positional structural diff.
//!
//! Rules, applied recursively with the current path:
//! - absent/null -> present: `Create`
//! - present -> absent/null: `Delete`
//! - unequal primitives: `Update`
//! - arrays: compared index by index up to the longer length
//! - objects: compared over the union of keys
//! - kind change (e.g. object -> string): one `Update` at the path
//!
//! Array diffing is positional, not move-aware. Reordering elements
//! produces a run of updates, and removing the first element of a list
//! shows up as updates of every later index plus a delete of the last.
//! Auto-generated commit messages inherit this.
//!
//! Output is depth-first; a parent path is always emitted before any of
//! its descendants, and object keys are visited in sorted order.

use std::collections::BTreeSet;

use serde_json::{Map, Number, Value};

use super::change::{child_index, child_key, Change};
use crate::document::Fields;

/// Compute the changes that turn `old` into `new`.
///
/// Pure and deterministic. `diff(x, x)` is always empty.
pub fn diff(old: &Value, new: &Value) -> Vec<Change> {
    let mut changes = Vec::new();
    walk("", Some(old), Some(new), &mut changes);
    changes
}

/// Diff two sets of sub-documents, with top-level field names as paths.
pub fn diff_fields(old: &Fields, new: &Fields) -> Vec<Change> {
    let mut changes = Vec::new();
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for key in keys {
        walk(key, old.get(key.as_str()), new.get(key.as_str()), &mut changes);
    }
    changes
}

fn walk(path: &str, old: Option<&Value>, new: Option<&Value>, out: &mut Vec<Change>) {
    match (present(old), present(new)) {
        (None, None) => {}
        (None, Some(new)) => out.push(Change::create(path.to_string(), new.clone())),
        (Some(old), None) => out.push(Change::delete(path.to_string(), old.clone())),
        (Some(Value::Array(old)), Some(Value::Array(new))) => walk_array(path, old, new, out),
        (Some(Value::Object(old)), Some(Value::Object(new))) => walk_object(path, old, new, out),
        (Some(old), Some(new)) => {
            if !primitive_eq(old, new) {
                out.push(Change::update(path.to_string(), old.clone(), new.clone()));
            }
        }
    }
}

fn walk_array(path: &str, old: &[Value], new: &[Value], out: &mut Vec<Change>) {
    for index in 0..old.len().max(new.len()) {
        walk(&child_index(path, index), old.get(index), new.get(index), out);
    }
}

fn walk_object(path: &str, old: &Map<String, Value>, new: &Map<String, Value>, out: &mut Vec<Change>) {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for key in keys {
        walk(&child_key(path, key), old.get(key.as_str()), new.get(key.as_str()), out);
    }
}

/// Null is treated as absent.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Equality for leaves and for mismatched kinds.
///
/// Numbers compare by numeric value so `1` and `1.0` are the same.
/// Two integers compare exactly; `f64` is only used when one side is a
/// float.
fn primitive_eq(old: &Value, new: &Value) -> bool {
    match (old, new) {
        (Value::Number(a), Value::Number(b)) => number_eq(a, b),
        _ => old == new,
    }
}

fn number_eq(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    if !a.is_f64() && !b.is_f64() {
        // One negative, one above i64::MAX.
        return false;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ChangeOperation;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "title": "Visit A",
            "entries": [{ "code": "I10", "note": null }, 3, "x"],
            "meta": { "tags": ["a", "b"], "score": 1.5, "flag": true },
        })
    }

    #[test]
    fn test_self_diff_is_empty() {
        assert!(diff(&sample(), &sample()).is_empty());
        assert!(diff(&Value::Null, &Value::Null).is_empty());
        assert!(diff(&json!([]), &json!([])).is_empty());
        assert!(diff(&json!({}), &json!({})).is_empty());
    }

    #[test]
    fn test_primitive_update() {
        let changes = diff(&json!({ "title": "Visit A" }), &json!({ "title": "Visit B" }));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].operation, ChangeOperation::Update);
        assert_eq!(changes[0].path, "title");
        assert_eq!(changes[0].old_value, Some(json!("Visit A")));
        assert_eq!(changes[0].new_value, Some(json!("Visit B")));
    }

    #[test]
    fn test_array_append_is_create_at_index() {
        let old = json!({ "entries": [{ "code": "I10" }] });
        let new = json!({ "entries": [{ "code": "I10" }, { "code": "E11" }] });

        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].operation, ChangeOperation::Create);
        assert_eq!(changes[0].path, "entries[1]");
        assert_eq!(changes[0].new_value, Some(json!({ "code": "E11" })));
    }

    #[test]
    fn test_array_truncate_is_delete_at_index() {
        let changes = diff(&json!([1, 2, 3]), &json!([1]));
        let paths: Vec<_> = changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["[1]", "[2]"]);
        assert!(changes.iter().all(|c| c.operation == ChangeOperation::Delete));
    }

    #[test]
    fn test_reorder_is_positional_updates() {
        let changes = diff(&json!({ "l": ["a", "b"] }), &json!({ "l": ["b", "a"] }));
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.operation == ChangeOperation::Update));
        assert_eq!(changes[0].path, "l[0]");
        assert_eq!(changes[1].path, "l[1]");
    }

    #[test]
    fn test_object_key_create_and_delete() {
        let changes = diff(&json!({ "a": 1, "b": 2 }), &json!({ "b": 2, "c": 3 }));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].operation, ChangeOperation::Delete);
        assert_eq!(changes[0].path, "a");
        assert_eq!(changes[1].operation, ChangeOperation::Create);
        assert_eq!(changes[1].path, "c");
    }

    #[test]
    fn test_kind_change_is_single_update() {
        let changes = diff(&json!({ "v": { "x": 1 } }), &json!({ "v": "flat" }));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].operation, ChangeOperation::Update);
        assert_eq!(changes[0].path, "v");
        assert_eq!(changes[0].old_value, Some(json!({ "x": 1 })));
    }

    #[test]
    fn test_null_is_absent() {
        let created = diff(&json!({ "n": null }), &json!({ "n": "text" }));
        assert_eq!(created[0].operation, ChangeOperation::Create);
        assert!(created[0].old_value.is_none());

        let deleted = diff(&json!({ "n": "text" }), &json!({}));
        assert_eq!(deleted[0].operation, ChangeOperation::Delete);
        assert!(deleted[0].new_value.is_none());

        assert!(diff(&json!({ "n": null }), &json!({})).is_empty());
    }

    #[test]
    fn test_numeric_equality_ignores_representation() {
        assert!(diff(&json!({ "n": 1 }), &json!({ "n": 1.0 })).is_empty());
        assert_eq!(diff(&json!({ "n": 1 }), &json!({ "n": 2 })).len(), 1);
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let changes = diff(
            &json!({ "id": 9007199254740993u64 }),
            &json!({ "id": 9007199254740992u64 }),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].operation, ChangeOperation::Update);
        assert_eq!(changes[0].path, "id");

        assert!(diff(&json!({ "n": u64::MAX }), &json!({ "n": u64::MAX })).is_empty());
        assert_eq!(diff(&json!({ "n": -1 }), &json!({ "n": u64::MAX })).len(), 1);
        assert!(diff(&json!({ "n": 2 }), &json!({ "n": 2.0 })).is_empty());
    }

    #[test]
    fn test_nested_paths_use_dots_and_brackets() {
        let old = json!({ "a": { "b": [{ "c": 1 }, { "c": 2 }, { "c": 3 }] } });
        let new = json!({ "a": { "b": [{ "c": 1 }, { "c": 2 }, { "c": 4 }] } });
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "a.b[2].c");
    }

    #[test]
    fn test_depth_first_parent_order() {
        let old = json!({ "a": { "x": 1 }, "b": [1] });
        let new = json!({ "a": { "x": 2, "y": 3 }, "b": [1, 2] });
        let paths: Vec<_> = diff(&old, &new).into_iter().map(|c| c.path).collect();
        assert_eq!(paths, vec!["a.x", "a.y", "b[1]"]);
    }

    #[test]
    fn test_update_never_has_equal_values() {
        let old = sample();
        let mut new = sample();
        new["meta"]["score"] = json!(2.5);
        new["entries"][1] = json!("3");
        for change in diff(&old, &new) {
            if change.operation == ChangeOperation::Update {
                assert_ne!(change.old_value, change.new_value);
            }
        }
    }

    #[test]
    fn test_diff_fields_uses_field_names_as_roots() {
        let mut old = Fields::new();
        old.insert("title".to_string(), json!("Visit A"));
        old.insert("notes".to_string(), json!("n"));
        let mut new = Fields::new();
        new.insert("title".to_string(), json!("Visit B"));
        new.insert("bundle".to_string(), json!({ "resourceType": "Bundle" }));

        let changes = diff_fields(&old, &new);
        let paths: Vec<_> = changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["bundle", "notes", "title"]);
        assert!(diff_fields(&old, &old).is_empty());
    }
}
