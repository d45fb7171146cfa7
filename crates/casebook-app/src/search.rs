// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Value;

use crate::model::Record;

/// Case-insensitive substring match over every scalar value of `record`.
/// A blank term matches everything.
pub fn record_matches(record: &Record, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    record
        .values()
        .any(|value| scalar_contains(value, &needle))
}

/// Indices into `rows` of the records matching `term`, in cache order.
pub fn filter_indices(rows: &[Record], term: &str) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, record)| record_matches(record, term))
        .map(|(index, _)| index)
        .collect()
}

fn scalar_contains(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(text) => text.to_lowercase().contains(needle),
        Value::Number(number) => number.to_string().contains(needle),
        Value::Bool(flag) => flag.to_string().contains(needle),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{filter_indices, record_matches};
    use crate::model::Record;
    use serde_json::{Value, json};

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn term_matches_case_insensitively() {
        let asha = record(json!({"id": 1, "name": "Asha Rao"}));
        let bob = record(json!({"id": 2, "name": "Bob"}));
        assert!(record_matches(&asha, "asha"));
        assert!(record_matches(&asha, "  RAO "));
        assert!(!record_matches(&bob, "asha"));
    }

    #[test]
    fn blank_term_matches_everything() {
        let rows = vec![record(json!({"name": "A"})), record(json!({}))];
        assert_eq!(filter_indices(&rows, "   "), vec![0, 1]);
    }

    #[test]
    fn numbers_and_booleans_are_searchable_but_arrays_are_not() {
        let row = record(json!({
            "phone_number": 5550123,
            "is_active": true,
            "days_of_week": ["Monday"],
        }));
        assert!(record_matches(&row, "0123"));
        assert!(record_matches(&row, "true"));
        assert!(!record_matches(&row, "monday"));
    }

    #[test]
    fn filter_keeps_cache_order() {
        let rows = vec![
            record(json!({"name": "Asha"})),
            record(json!({"name": "Bob"})),
            record(json!({"name": "Sasha"})),
        ];
        assert_eq!(filter_indices(&rows, "sha"), vec![0, 2]);
    }
}
