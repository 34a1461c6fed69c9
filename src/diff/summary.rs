//! Change summaries and generated commit messages.

use std::collections::BTreeSet;

use serde::Serialize;

use super::{Change, ChangeOperation};

/// Message recorded for an edit whose diff is empty.
pub const NO_CHANGES_MESSAGE: &str = "No changes detected";

/// Fields listed by name in a generated message before eliding.
const MESSAGE_FIELD_LIMIT: usize = 3;

/// Counts over a change list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub total_changes: usize,
    /// Distinct top-level fields touched.
    pub fields_touched: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl ChangeSummary {
    pub fn of(changes: &[Change]) -> Self {
        let mut summary = ChangeSummary {
            total_changes: changes.len(),
            fields_touched: touched_fields(changes).len(),
            ..Default::default()
        };
        for change in changes {
            match change.operation {
                ChangeOperation::Create => summary.creates += 1,
                ChangeOperation::Update => summary.updates += 1,
                ChangeOperation::Delete => summary.deletes += 1,
            }
        }
        summary
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total_changes == 0
    }
}

fn touched_fields(changes: &[Change]) -> BTreeSet<&str> {
    changes.iter().map(Change::top_level_field).collect()
}

/// Generate a commit message for an edit.
pub fn commit_message(changes: &[Change]) -> String {
    match changes {
        [] => NO_CHANGES_MESSAGE.to_string(),
        [single] => single.description.clone(),
        _ => {
            let fields: Vec<&str> = touched_fields(changes).into_iter().collect();
            let mut listed = fields
                .iter()
                .take(MESSAGE_FIELD_LIMIT)
                .copied()
                .collect::<Vec<_>>()
                .join(", ");
            if fields.len() > MESSAGE_FIELD_LIMIT {
                listed.push_str(&format!(" and {} more", fields.len() - MESSAGE_FIELD_LIMIT));
            }
            format!("Updated {} ({} changes)", listed, changes.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_counts() {
        let changes = vec![
            Change::update("title".to_string(), json!("a"), json!("b")),
            Change::create("entries[1]".to_string(), json!(1)),
            Change::create("entries[2]".to_string(), json!(2)),
            Change::delete("notes".to_string(), json!("n")),
        ];
        let summary = ChangeSummary::of(&changes);
        assert_eq!(summary.total_changes, 4);
        assert_eq!(summary.fields_touched, 3);
        assert_eq!(summary.creates, 2);
        assert_eq!(summary.updates, 1);
        assert_eq!(summary.deletes, 1);
    }

    #[test]
    fn test_empty_summary() {
        assert!(ChangeSummary::of(&[]).is_empty());
    }

    #[test]
    fn test_message_for_no_changes() {
        assert_eq!(commit_message(&[]), NO_CHANGES_MESSAGE);
    }

    #[test]
    fn test_message_for_single_change() {
        let change = Change::update("title".to_string(), json!("Visit A"), json!("Visit B"));
        assert_eq!(commit_message(&[change.clone()]), change.description);
    }

    #[test]
    fn test_message_for_many_fields() {
        let changes: Vec<_> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|f| Change::create(f.to_string(), json!(1)))
            .collect();
        assert_eq!(commit_message(&changes), "Updated a, b, c and 2 more (5 changes)");
    }
}
