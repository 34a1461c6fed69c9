//! Change - one structural edit between two document states.
//!
//! Shape constraints:
//! - `Update` carries both values and they differ
//! - `Create` carries no old value
//! - `Delete` carries no new value
//!
//! The constructors are the only way to build a `Change` outside serde,
//! so the constraints hold for every change the engine emits.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of structural edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

impl ChangeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::Create => "create",
            ChangeOperation::Update => "update",
            ChangeOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structural edit at a path such as `a.b[2].c`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub operation: ChangeOperation,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    pub description: String,
}

impl Change {
    pub fn create(path: String, new_value: Value) -> Self {
        let description = format!("Added {}", display_path(&path));
        Self {
            operation: ChangeOperation::Create,
            path,
            old_value: None,
            new_value: Some(new_value),
            description,
        }
    }

    pub fn update(path: String, old_value: Value, new_value: Value) -> Self {
        let description = format!(
            "Changed {} from {} to {}",
            display_path(&path),
            preview(&old_value),
            preview(&new_value)
        );
        Self {
            operation: ChangeOperation::Update,
            path,
            old_value: Some(old_value),
            new_value: Some(new_value),
            description,
        }
    }

    pub fn delete(path: String, old_value: Value) -> Self {
        let description = format!("Removed {}", display_path(&path));
        Self {
            operation: ChangeOperation::Delete,
            path,
            old_value: Some(old_value),
            new_value: None,
            description,
        }
    }

    /// First segment of the path: the sub-document this change touches.
    pub fn top_level_field(&self) -> &str {
        let end = self
            .path
            .find(|c| c == '.' || c == '[')
            .unwrap_or(self.path.len());
        &self.path[..end]
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "document"
    } else {
        path
    }
}

const PREVIEW_LIMIT: usize = 40;

/// Short human rendering of a value for descriptions.
fn preview(value: &Value) -> String {
    match value {
        Value::String(s) if s.chars().count() <= PREVIEW_LIMIT => format!("\"{}\"", s),
        Value::String(s) => {
            let cut: String = s.chars().take(PREVIEW_LIMIT).collect();
            format!("\"{}...\"", cut)
        }
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(map) => format!("{{{} fields}}", map.len()),
        other => other.to_string(),
    }
}

/// Path of a member key under `parent`.
pub(crate) fn child_key(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Path of an array element under `parent`.
pub(crate) fn child_index(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}
