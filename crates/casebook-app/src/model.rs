// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::format::humanize;
use crate::ids::{RecordId, ScopeId};

/// One row as returned by the backend, keyed by column name.
pub type Record = Map<String, Value>;

pub const SCOPE_COLUMN: &str = "center_id";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const DEFAULT_TABLES: [&str; 3] = ["students", "educators", "employees"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub display_name: Option<String>,
    pub scope_id: Option<ScopeId>,
}

impl TableDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            display_name: None,
            scope_id: None,
        }
    }

    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = Some(display_name.to_owned());
        self
    }

    pub fn with_scope(mut self, scope_id: Option<ScopeId>) -> Self {
        self.scope_id = scope_id;
        self
    }

    /// Collection name as the backend knows it.
    pub fn remote_name(&self) -> String {
        self.name.trim().to_ascii_lowercase()
    }

    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => humanize(&self.remote_name()),
        }
    }

    pub fn scope_filter(&self) -> Option<ScopeFilter> {
        self.scope_id.clone().map(|value| ScopeFilter {
            column: SCOPE_COLUMN.to_owned(),
            value,
        })
    }
}

/// Equality predicate restricting rows to one owner partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub column: String,
    pub value: ScopeId,
}

impl ScopeFilter {
    pub fn matches(&self, record: &Record) -> bool {
        record
            .get(&self.column)
            .and_then(ScopeId::from_json)
            .is_some_and(|value| value == self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormMode {
    Create,
    Edit,
}

impl FormMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Create => "add record",
            Self::Edit => "edit record",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewPhase {
    Loading,
    Ready,
    Form(FormMode),
    ConfirmDelete(RecordId),
    Uploading,
    Dictating,
    Error(String),
}

impl ViewPhase {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Form(FormMode::Create) => "add",
            Self::Form(FormMode::Edit) => "edit",
            Self::ConfirmDelete(_) => "confirm delete",
            Self::Uploading => "upload",
            Self::Dictating => "dictate",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Metadata,
    Rows,
    Mutation,
    Unexpected,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Rows => "rows",
            Self::Mutation => "mutation",
            Self::Unexpected => "unexpected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub failure: Option<FailureKind>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
            failure: None,
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            failure: Some(kind),
        }
    }
}

/// Result reported by the bulk importer back to the table view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportOutcome {
    Completed { inserted: usize },
    Cancelled,
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::{Record, ScopeFilter, TableDescriptor};
    use crate::ScopeId;
    use serde_json::json;

    #[test]
    fn remote_name_is_lower_cased_and_trimmed() {
        let table = TableDescriptor::new(" Students ");
        assert_eq!(table.remote_name(), "students");
        assert_eq!(table.label(), "Students");
    }

    #[test]
    fn display_name_wins_over_humanized_name() {
        let table = TableDescriptor::new("educators").with_display_name("Teaching staff");
        assert_eq!(table.label(), "Teaching staff");
    }

    #[test]
    fn scope_filter_matches_on_center_column() {
        let table = TableDescriptor::new("students").with_scope(Some(ScopeId::from(3)));
        let filter = table.scope_filter().expect("scoped table has a filter");
        assert_eq!(filter.column, "center_id");

        let mut inside = Record::new();
        inside.insert("center_id".to_owned(), json!(3));
        let mut outside = Record::new();
        outside.insert("center_id".to_owned(), json!(4));

        assert!(filter.matches(&inside));
        assert!(!filter.matches(&outside));
        assert!(!filter.matches(&Record::new()));
    }

    #[test]
    fn unscoped_table_has_no_filter() {
        assert_eq!(TableDescriptor::new("students").scope_filter(), None::<ScopeFilter>);
    }
}
