//! Decoding of the TiCDC "simple" envelope.
//!
//! A change event is a JSON object carrying one of `c` (insert), `u` (update) or `d` (delete).
//! The key maps to the row, and every column of the row is wrapped as `{"v": <value>, ...}`:
//!
//! ```json
//! {"c": {"id": {"v": 7}, "name": {"v": "a"}}}
//! ```
//!
//! Neither the single-key rule nor the `v` wrapper is validated upstream, so both are treated as
//! structural assumptions: anything that does not fit decodes as [`Operation::Unknown`] and keeps
//! the input value.

use serde::Serialize;
use serde_json::{Map, Value};

/// Keys are checked in this order, the first one present wins.
const OPERATION_KEYS: [(&str, Operation); 3] = [
    ("c", Operation::Insert),
    ("u", Operation::Update),
    ("d", Operation::Delete),
];

const COLUMN_VALUE_KEY: &str = "v";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedChange {
    pub operation: Operation,
    /// Column name to value for recognised operations, the untouched input for `Unknown`.
    pub data: Value,
}

pub fn decode(value: &Value) -> DecodedChange {
    let Some(envelope) = value.as_object() else {
        return DecodedChange::unknown(value);
    };

    OPERATION_KEYS
        .iter()
        .find_map(|(key, operation)| match envelope.get(*key) {
            Some(Value::Null) | None => None,
            Some(row) => Some(DecodedChange {
                operation: *operation,
                data: Value::Object(extract_row(row)),
            }),
        })
        .unwrap_or_else(|| DecodedChange::unknown(value))
}

impl DecodedChange {
    fn unknown(value: &Value) -> Self {
        Self {
            operation: Operation::Unknown,
            data: value.clone(),
        }
    }
}

/// Unwraps every column's `v`. Columns without one decode to `null`, a row that is not an object
/// decodes to no columns.
fn extract_row(row: &Value) -> Map<String, Value> {
    let Some(columns) = row.as_object() else {
        return Map::new();
    };

    columns
        .iter()
        .map(|(column, meta)| {
            let value = meta
                .get(COLUMN_VALUE_KEY)
                .cloned()
                .unwrap_or(Value::Null);
            (column.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_unwraps_column_values() {
        let change = decode(&json!({"c": {"id": {"v": 7}, "name": {"v": "a"}}}));
        assert_eq!(change.operation, Operation::Insert);
        assert_eq!(change.data, json!({"id": 7, "name": "a"}));
    }

    #[test]
    fn update_and_delete() {
        let change = decode(&json!({"u": {"status": {"v": "paid"}}}));
        assert_eq!(change.operation, Operation::Update);
        assert_eq!(change.data, json!({"status": "paid"}));

        let change = decode(&json!({"d": {"id": {"v": 3, "t": 3}}}));
        assert_eq!(change.operation, Operation::Delete);
        assert_eq!(change.data, json!({"id": 3}));
    }

    #[test]
    fn insert_wins_over_delete() {
        let change = decode(&json!({
            "d": {"id": {"v": 1}},
            "c": {"id": {"v": 2}},
        }));
        assert_eq!(change.operation, Operation::Insert);
        assert_eq!(change.data, json!({"id": 2}));

        let change = decode(&json!({"d": {"id": {"v": 1}}, "u": {"id": {"v": 9}}}));
        assert_eq!(change.operation, Operation::Update);
    }

    #[test]
    fn unrecognised_envelope_is_preserved() {
        let change = decode(&json!({}));
        assert_eq!(change.operation, Operation::Unknown);
        assert_eq!(change.data, json!({}));

        let envelope = json!({"ddl": "ALTER TABLE users ADD COLUMN age INT", "ts": 1});
        let change = decode(&envelope);
        assert_eq!(change.operation, Operation::Unknown);
        assert_eq!(change.data, envelope);
    }

    #[test]
    fn null_operation_key_is_skipped() {
        let change = decode(&json!({"c": null, "u": {"id": {"v": 5}}}));
        assert_eq!(change.operation, Operation::Update);
        assert_eq!(change.data, json!({"id": 5}));
    }

    #[test]
    fn missing_v_decodes_to_null() {
        let change = decode(&json!({"c": {"id": {"t": 3}, "flag": true, "name": {"v": null}}}));
        assert_eq!(change.operation, Operation::Insert);
        assert_eq!(change.data, json!({"id": null, "flag": null, "name": null}));
    }

    #[test]
    fn nested_values_are_kept_whole() {
        let change = decode(&json!({"c": {"tags": {"v": ["a", "b"]}, "meta": {"v": {"k": 1}}}}));
        assert_eq!(change.data, json!({"tags": ["a", "b"], "meta": {"k": 1}}));
    }

    #[test]
    fn decoding_is_repeatable() {
        let envelope = json!({"u": {"id": {"v": 1}, "email": {"v": "a@x.com"}}});
        assert_eq!(decode(&envelope), decode(&envelope));
    }

    #[test]
    fn operation_serializes_uppercase() {
        assert_eq!(serde_json::to_value(Operation::Insert).unwrap(), json!("INSERT"));
        assert_eq!(serde_json::to_value(Operation::Unknown).unwrap(), json!("UNKNOWN"));
    }
}
