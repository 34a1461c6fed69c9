//! Boundary conversion of caller documents into persistable `Fields`.
//!
//! `Fields` has no representation for an unset value, so anything that
//! reaches a store has already been through one of these functions.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::Fields;
use crate::history::{VersionError, VersionResult};

/// Replace unset sub-documents with explicit nulls.
pub fn from_draft(draft: BTreeMap<String, Option<Value>>) -> Fields {
    draft
        .into_iter()
        .map(|(name, value)| (name, value.unwrap_or(Value::Null)))
        .collect()
}

/// Convert a typed document into `Fields`.
///
/// `None` members serialize as `null`. The top level must be an object.
pub fn to_fields<T: Serialize>(document: &T) -> VersionResult<Fields> {
    let value = serde_json::to_value(document)
        .map_err(|e| VersionError::Serialization(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(VersionError::Serialization(format!(
            "document must be an object, got {}",
            kind_name(&other)
        ))),
    }
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Encounter {
        title: String,
        notes: Option<String>,
        vitals: Vitals,
    }

    #[derive(Serialize)]
    struct Vitals {
        pulse: Option<u32>,
    }

    #[test]
    fn test_from_draft_nulls_unset_fields() {
        let mut draft = BTreeMap::new();
        draft.insert("title".to_string(), Some(json!("Visit A")));
        draft.insert("notes".to_string(), None);

        let fields = from_draft(draft);
        assert_eq!(fields["title"], json!("Visit A"));
        assert_eq!(fields["notes"], Value::Null);
    }

    #[test]
    fn test_to_fields_nulls_nested_options() {
        let doc = Encounter {
            title: "Visit A".to_string(),
            notes: None,
            vitals: Vitals { pulse: None },
        };

        let fields = to_fields(&doc).unwrap();
        assert_eq!(fields["notes"], Value::Null);
        assert_eq!(fields["vitals"], json!({ "pulse": null }));
    }

    #[test]
    fn test_to_fields_rejects_non_object() {
        let err = to_fields(&vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, VersionError::Serialization(_)));
    }

    #[test]
    fn test_to_fields_rejects_unrepresentable_keys() {
        let mut doc: HashMap<(u8, u8), u8> = HashMap::new();
        doc.insert((1, 2), 3);
        let err = to_fields(&doc).unwrap_err();
        assert!(matches!(err, VersionError::Serialization(_)));
    }
}
