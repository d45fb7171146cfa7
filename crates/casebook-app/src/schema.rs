// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Column kinds inferred from naming conventions.
//!
//! The backend only reports column names, so the kind of every column is
//! decided from its name (plus one runtime rule for boolean values) when a
//! table is loaded. Rendering and coercion read the resolved [`TableSchema`]
//! instead of re-running the heuristics.

use anyhow::{Result, bail};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::model::{Record, SCOPE_COLUMN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Weekdays,
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceSet {
    Gender,
    BloodGroup,
    Status,
    Priority,
    SessionType,
    EmploymentType,
    Transport,
}

impl ChoiceSet {
    pub const ALL: [Self; 7] = [
        Self::Gender,
        Self::BloodGroup,
        Self::Status,
        Self::Priority,
        Self::SessionType,
        Self::EmploymentType,
        Self::Transport,
    ];

    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Gender => "gender",
            Self::BloodGroup => "blood_group",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::SessionType => "session_type",
            Self::EmploymentType => "employment_type",
            Self::Transport => "transport",
        }
    }

    pub const fn options(self) -> &'static [&'static str] {
        match self {
            Self::Gender => &["Male", "Female", "Other", "Prefer not to say"],
            Self::BloodGroup => &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-", "Unknown"],
            Self::Status => &["Active", "Inactive", "On Leave", "Graduated", "Transferred"],
            Self::Priority => &["High", "Medium", "Low"],
            Self::SessionType => &["Individual", "Group", "Online", "Hybrid"],
            Self::EmploymentType => &["Full-time", "Part-time", "Contract", "Intern", "Volunteer"],
            Self::Transport => &[
                "School Bus",
                "Parent Drop",
                "Public Transport",
                "Self",
                "Not Required",
            ],
        }
    }

    pub fn for_field(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|choice| choice.field_name() == name)
    }

    /// Option spelled the way the set lists it, matched case-insensitively.
    pub fn canonical(self, raw: &str) -> Option<&'static str> {
        let wanted = raw.trim();
        self.options()
            .iter()
            .copied()
            .find(|option| option.eq_ignore_ascii_case(wanted))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Date,
    Array(ArrayKind),
    Boolean,
    Choice(ChoiceSet),
    Password,
    LongText,
    Numeric,
    Email,
    Text,
}

impl FieldKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Array(ArrayKind::Weekdays) => "weekdays",
            Self::Array(ArrayKind::Free) => "list",
            Self::Boolean => "yes/no",
            Self::Choice(_) => "choice",
            Self::Password => "password",
            Self::LongText => "long text",
            Self::Numeric => "number",
            Self::Email => "email",
            Self::Text => "text",
        }
    }
}

pub const WEEKDAYS: [(&str, &str); 7] = [
    ("1", "Monday"),
    ("2", "Tuesday"),
    ("3", "Wednesday"),
    ("4", "Thursday"),
    ("5", "Friday"),
    ("6", "Saturday"),
    ("7", "Sunday"),
];

const LONG_TEXT_FIELDS: [&str; 8] = [
    "address",
    "comments",
    "description",
    "strengths",
    "weakness",
    "primary_diagnosis",
    "comorbidity",
    "allergies",
];

pub fn weekday_label(code: &str) -> Option<&'static str> {
    WEEKDAYS
        .iter()
        .find(|(candidate, _)| *candidate == code.trim())
        .map(|(_, label)| *label)
}

/// Accepts a weekday code (`1`..`7`), a full name, or a three-letter abbreviation.
pub fn weekday_code(input: &str) -> Option<&'static str> {
    let wanted = input.trim();
    WEEKDAYS
        .iter()
        .find(|(code, label)| {
            *code == wanted
                || label.eq_ignore_ascii_case(wanted)
                || (wanted.len() == 3
                    && label
                        .get(..3)
                        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(wanted)))
        })
        .map(|(code, _)| *code)
}

/// Infers a column's kind from its name. Checks run in a fixed priority order.
pub fn classify(name: &str) -> FieldKind {
    let name = name.trim().to_ascii_lowercase();

    if name.contains("date") || name == "dob" || name == "created_at" {
        return FieldKind::Date;
    }
    if name == "days_of_week" {
        return FieldKind::Array(ArrayKind::Weekdays);
    }
    if name == "timings" || name.contains("array") {
        return FieldKind::Array(ArrayKind::Free);
    }
    if name.contains("is_") || name == "attendance" {
        return FieldKind::Boolean;
    }
    if let Some(choice) = ChoiceSet::for_field(&name) {
        return FieldKind::Choice(choice);
    }
    if name == "password" {
        return FieldKind::Password;
    }
    if LONG_TEXT_FIELDS.contains(&name.as_str()) {
        return FieldKind::LongText;
    }
    if name.contains("_id") || name.contains("number") || name.contains("year") {
        return FieldKind::Numeric;
    }
    if name.contains("email") {
        return FieldKind::Email;
    }
    FieldKind::Text
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: FieldKind,
}

/// Column kinds for one table, fixed for the life of a loaded view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table: String,
    columns: Vec<ColumnSpec>,
    id_column: String,
}

impl TableSchema {
    pub fn resolve(table: &str, columns: &[String], rows: &[Record]) -> Result<Self> {
        if columns.is_empty() {
            bail!("table `{table}` reported no columns -- check that it is exposed by the API");
        }

        let mut seen = BTreeSet::new();
        let mut specs = Vec::with_capacity(columns.len());
        for name in columns {
            if name.trim().is_empty() {
                bail!("table `{table}` reported a column with an empty name");
            }
            if !seen.insert(name.as_str()) {
                bail!("table `{table}` reported column `{name}` twice");
            }

            let mut kind = classify(name);
            if promotes_to_boolean(kind) && column_holds_booleans(rows, name) {
                kind = FieldKind::Boolean;
            }
            specs.push(ColumnSpec {
                name: name.clone(),
                kind,
            });
        }

        let id_column = identify_id_column(table, columns);
        Ok(Self {
            table: table.to_owned(),
            columns: specs,
            id_column,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.column(name).map(|column| column.kind)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

const fn promotes_to_boolean(kind: FieldKind) -> bool {
    !matches!(kind, FieldKind::Date | FieldKind::Array(_) | FieldKind::Boolean)
}

fn column_holds_booleans(rows: &[Record], column: &str) -> bool {
    rows.iter()
        .any(|row| matches!(row.get(column), Some(Value::Bool(_))))
}

fn identify_id_column(table: &str, columns: &[String]) -> String {
    if columns.iter().any(|column| column == "id") {
        return "id".to_owned();
    }

    let table = table.trim().to_ascii_lowercase();
    let singular = table.strip_suffix('s').unwrap_or(&table);
    let entity_key = format!("{singular}_id");
    if let Some(column) = columns.iter().find(|column| **column == entity_key) {
        return column.clone();
    }

    columns
        .iter()
        .find(|column| column.ends_with("_id") && column.as_str() != SCOPE_COLUMN)
        .or_else(|| columns.first())
        .cloned()
        .unwrap_or_else(|| "id".to_owned())
}
