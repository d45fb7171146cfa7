// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::format::{coerce, parse_input};
use crate::ids::{RecordId, ScopeId};
use crate::model::{FormMode, Record, SCOPE_COLUMN};
use crate::schema::TableSchema;

/// Write request produced by submitting a [`Draft`].
#[derive(Debug, Clone, PartialEq)]
pub enum FormPayload {
    Insert(Record),
    Update { id: RecordId, row: Record },
}

/// Pending field values for the record form.
///
/// Keys are always a subset of the table's columns. `edited` names the
/// columns changed since the draft was opened.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    mode: FormMode,
    original_id: Option<RecordId>,
    values: Record,
    edited: BTreeSet<String>,
}

impl Draft {
    pub fn blank(schema: &TableSchema, scope: Option<&ScopeId>) -> Self {
        let mut values = Record::new();
        for name in schema.column_names() {
            values.insert(name.to_owned(), Value::Null);
        }
        if let Some(scope) = scope.filter(|_| schema.has_column(SCOPE_COLUMN)) {
            values.insert(SCOPE_COLUMN.to_owned(), scope.to_json());
        }

        Self {
            mode: FormMode::Create,
            original_id: None,
            values,
            edited: BTreeSet::new(),
        }
    }

    pub fn from_record(schema: &TableSchema, record: &Record) -> Result<Self> {
        let id_column = schema.id_column();
        let Some(id) = record.get(id_column).and_then(RecordId::from_json) else {
            bail!(
                "record has no `{id_column}` value -- it cannot be edited from `{}`",
                schema.table()
            );
        };

        let values = schema
            .column_names()
            .map(|name| {
                (
                    name.to_owned(),
                    record.get(name).cloned().unwrap_or(Value::Null),
                )
            })
            .collect();

        Ok(Self {
            mode: FormMode::Edit,
            original_id: Some(id),
            values,
            edited: BTreeSet::new(),
        })
    }

    pub const fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn original_id(&self) -> Option<&RecordId> {
        self.original_id.as_ref()
    }

    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn is_edited(&self, column: &str) -> bool {
        self.edited.contains(column)
    }

    /// Parses raw form text for `column` and stores the result.
    pub fn set_input(&mut self, schema: &TableSchema, column: &str, raw: &str) -> Result<()> {
        let Some(kind) = schema.kind_of(column) else {
            bail!(
                "`{}` has no column `{column}` -- pick one of: {}",
                schema.table(),
                schema.column_names().collect::<Vec<_>>().join(", ")
            );
        };
        let value = parse_input(kind, raw)?;
        self.set_value(schema, column, value)
    }

    pub fn set_value(&mut self, schema: &TableSchema, column: &str, value: Value) -> Result<()> {
        if !schema.has_column(column) {
            bail!("`{}` has no column `{column}`", schema.table());
        }
        if self.mode == FormMode::Edit && column == schema.id_column() {
            bail!("`{column}` identifies the record and cannot be changed");
        }
        self.values.insert(column.to_owned(), value);
        self.edited.insert(column.to_owned());
        Ok(())
    }

    /// Builds the write for this draft. New records coerce every column;
    /// edits coerce only the columns that were changed and send the rest
    /// back exactly as loaded.
    pub fn payload(&self, schema: &TableSchema) -> Result<FormPayload> {
        let mut row = Record::new();
        for column in schema.columns() {
            let value = self.values.get(&column.name).unwrap_or(&Value::Null);
            let stored = if self.mode == FormMode::Edit && !self.is_edited(&column.name) {
                value.clone()
            } else {
                coerce(column.kind, value)
            };
            row.insert(column.name.clone(), stored);
        }

        match self.mode {
            FormMode::Create => {
                let id_column = schema.id_column();
                if row.get(id_column).is_some_and(Value::is_null) {
                    row.remove(id_column);
                }
                Ok(FormPayload::Insert(row))
            }
            FormMode::Edit => {
                let Some(id) = self.original_id.clone() else {
                    bail!("edit form lost its record id -- reopen the record");
                };
                Ok(FormPayload::Update { id, row })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Draft, FormPayload};
    use crate::ids::{RecordId, ScopeId};
    use crate::model::Record;
    use crate::schema::TableSchema;
    use serde_json::{Value, json};

    fn students() -> TableSchema {
        let columns = ["id", "name", "dob", "gender", "days_of_week"]
            .map(str::to_owned)
            .to_vec();
        TableSchema::resolve("students", &columns, &[]).expect("schema resolves")
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn blank_draft_submits_nulls_and_omits_null_id() {
        let schema = students();
        let draft = Draft::blank(&schema, None);
        let FormPayload::Insert(row) = draft.payload(&schema).expect("payload") else {
            panic!("blank draft should insert");
        };
        assert!(!row.contains_key("id"));
        assert_eq!(row.len(), 4);
        assert!(row.values().all(Value::is_null));
    }

    #[test]
    fn create_payload_coerces_form_text() {
        let schema = students();
        let mut draft = Draft::blank(&schema, None);
        draft.set_input(&schema, "name", "Asha").expect("name");
        draft.set_input(&schema, "dob", "2010-04-01").expect("dob");
        draft.set_input(&schema, "gender", "female").expect("gender");
        draft.set_input(&schema, "days_of_week", "1,3").expect("days");

        assert_eq!(
            draft.payload(&schema).expect("payload"),
            FormPayload::Insert(record(json!({
                "name": "Asha",
                "dob": "2010-04-01",
                "gender": "Female",
                "days_of_week": ["1", "3"],
            })))
        );
    }

    #[test]
    fn scope_is_prefilled_only_when_the_table_has_the_column() {
        let columns = ["id", "name", "center_id"].map(str::to_owned).to_vec();
        let scoped = TableSchema::resolve("students", &columns, &[]).expect("schema");
        let scope = ScopeId::from(4);

        let draft = Draft::blank(&scoped, Some(&scope));
        assert_eq!(draft.get("center_id"), Some(&json!(4)));

        let draft = Draft::blank(&students(), Some(&scope));
        assert_eq!(draft.get("center_id"), None);
    }

    #[test]
    fn unchanged_edit_reproduces_the_original_record() {
        let schema = students();
        let original = record(json!({
            "id": 9,
            "name": "Asha Rao",
            "dob": "2010-04-01",
            "gender": "Female",
            "days_of_week": ["1", "3"],
        }));
        let draft = Draft::from_record(&schema, &original).expect("draft");
        assert_eq!(
            draft.payload(&schema).expect("payload"),
            FormPayload::Update {
                id: RecordId::from(9),
                row: original,
            }
        );
    }

    #[test]
    fn untouched_columns_keep_their_server_shape_on_edit() {
        let columns = ["id", "timings", "comments", "days_of_week"]
            .map(str::to_owned)
            .to_vec();
        let schema = TableSchema::resolve("students", &columns, &[]).expect("schema");
        let original = record(json!({
            "id": 1,
            "timings": "9:00, 11:00",
            "comments": "",
            "days_of_week": "1,3",
        }));

        let draft = Draft::from_record(&schema, &original).expect("draft");
        assert_eq!(
            draft.payload(&schema).expect("payload"),
            FormPayload::Update {
                id: RecordId::from(1),
                row: original.clone(),
            }
        );

        let mut draft = draft;
        draft
            .set_value(&schema, "days_of_week", json!("2, 4"))
            .expect("edit");
        let FormPayload::Update { row, .. } = draft.payload(&schema).expect("payload") else {
            panic!("edit draft should update");
        };
        assert_eq!(row["days_of_week"], json!(["2", "4"]));
        assert_eq!(row["timings"], json!("9:00, 11:00"));
        assert_eq!(row["comments"], json!(""));
    }

    #[test]
    fn edit_mode_refuses_identifier_changes() {
        let schema = students();
        let original = record(json!({"id": 1, "name": "Bob"}));
        let mut draft = Draft::from_record(&schema, &original).expect("draft");
        let error = draft
            .set_input(&schema, "id", "2")
            .expect_err("id is immutable");
        assert!(error.to_string().contains("cannot be changed"));
        assert_eq!(draft.get("dob"), Some(&Value::Null));
    }

    #[test]
    fn unknown_column_and_bad_input_leave_draft_unchanged() {
        let schema = students();
        let mut draft = Draft::blank(&schema, None);
        assert!(draft.set_input(&schema, "nickname", "A").is_err());
        assert!(draft.set_input(&schema, "gender", "robot").is_err());
        assert_eq!(draft.get("gender"), Some(&Value::Null));
        assert!(draft.get("nickname").is_none());
    }

    #[test]
    fn record_without_identifier_cannot_be_edited() {
        let schema = students();
        let error = Draft::from_record(&schema, &record(json!({"name": "Bob"})))
            .expect_err("missing id");
        assert!(error.to_string().contains("no `id` value"));
    }
}
