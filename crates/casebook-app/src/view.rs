// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Controller for one table: load, search, form, delete, import, dictation.
//!
//! Every operation returns the [`ViewEvent`]s it caused. Load failures put
//! the view in [`ViewPhase::Error`]; mutation failures only emit a notice and
//! leave the cache and the open form untouched.

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::backend::Backend;
use crate::dictation::FieldMap;
use crate::forms::{Draft, FormPayload};
use crate::ids::{RecordId, ScopeId};
use crate::model::{
    CREATED_AT_COLUMN, FailureKind, FormMode, ImportOutcome, Notice, Record, TableDescriptor,
    ViewPhase,
};
use crate::schema::TableSchema;
use crate::search::filter_indices;

/// Generation number of a load. Only the newest ticket may finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTable {
    pub schema: TableSchema,
    pub rows: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    PhaseChanged(ViewPhase),
    Loaded { rows: usize },
    LoadDiscarded,
    SearchChanged { visible: usize },
    RowInserted(usize),
    RowReplaced(usize),
    RowRemoved(usize),
    ReloadRequested,
    Notice(Notice),
}

/// Fetches columns, then rows. Either failure aborts the whole load.
pub fn fetch_table(
    backend: &mut dyn Backend,
    table: &TableDescriptor,
) -> Result<LoadedTable, LoadFailure> {
    let name = table.remote_name();
    let columns = backend
        .fetch_columns(&name)
        .with_context(|| format!("load columns of `{name}`"))
        .map_err(|error| LoadFailure {
            kind: FailureKind::Metadata,
            message: format!("{error:#}"),
        })?;

    let scope = table.scope_filter();
    let rows = backend
        .select(&name, scope.as_ref())
        .with_context(|| format!("load rows of `{name}`"))
        .map_err(|error| LoadFailure {
            kind: FailureKind::Rows,
            message: format!("{error:#}"),
        })?;

    let schema = TableSchema::resolve(&name, &columns, &rows).map_err(|error| LoadFailure {
        kind: FailureKind::Metadata,
        message: format!("{error:#}"),
    })?;
    Ok(LoadedTable { schema, rows })
}

#[derive(Debug, Clone)]
pub struct TableView {
    table: TableDescriptor,
    generation: u64,
    phase: ViewPhase,
    schema: Option<TableSchema>,
    rows: Vec<Record>,
    search: String,
    visible: Vec<usize>,
    draft: Option<Draft>,
}

impl TableView {
    pub fn new(table: TableDescriptor) -> Self {
        Self {
            table,
            generation: 0,
            phase: ViewPhase::Loading,
            schema: None,
            rows: Vec::new(),
            search: String::new(),
            visible: Vec::new(),
            draft: None,
        }
    }

    pub fn table(&self) -> &TableDescriptor {
        &self.table
    }

    pub fn phase(&self) -> &ViewPhase {
        &self.phase
    }

    pub fn schema(&self) -> Option<&TableSchema> {
        self.schema.as_ref()
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn search_term(&self) -> &str {
        &self.search
    }

    /// Cache indices of rows passing the current search, in cache order.
    pub fn visible(&self) -> &[usize] {
        &self.visible
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = (usize, &Record)> {
        self.visible
            .iter()
            .filter_map(|index| self.rows.get(*index).map(|row| (*index, row)))
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    /// Starts a deferred load. Pair with `finish_load` once the fetch returns;
    /// any newer load invalidates the ticket.
    pub fn begin_load(&mut self) -> (LoadTicket, Vec<ViewEvent>) {
        self.generation += 1;
        self.draft = None;
        let events = self.set_phase(ViewPhase::Loading);
        (LoadTicket(self.generation), events)
    }

    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<LoadedTable, LoadFailure>,
    ) -> Vec<ViewEvent> {
        if ticket.0 != self.generation {
            tracing::debug!(
                table = %self.table.remote_name(),
                ticket = ticket.0,
                latest = self.generation,
                "discarding stale load"
            );
            return vec![ViewEvent::LoadDiscarded];
        }

        match result {
            Ok(LoadedTable { schema, rows }) => {
                tracing::info!(
                    table = %schema.table(),
                    columns = schema.len(),
                    rows = rows.len(),
                    "table loaded"
                );
                self.schema = Some(schema);
                self.rows = rows;
                self.search.clear();
                self.refilter();
                let mut events = vec![ViewEvent::Loaded {
                    rows: self.rows.len(),
                }];
                events.extend(self.set_phase(ViewPhase::Ready));
                events
            }
            Err(failure) => {
                tracing::error!(
                    table = %self.table.remote_name(),
                    failure = failure.kind.as_str(),
                    error = %failure.message,
                    "table load failed"
                );
                self.schema = None;
                self.rows.clear();
                self.visible.clear();
                let mut events = self.set_phase(ViewPhase::Error(failure.message.clone()));
                events.push(ViewEvent::Notice(Notice::failure(
                    failure.kind,
                    failure.message,
                )));
                events
            }
        }
    }

    /// Fetches and applies in one call, so nothing can interleave. The terminal
    /// loop uses this; the ticket pair serves callers that fetch elsewhere.
    pub fn load(&mut self, backend: &mut dyn Backend) -> Vec<ViewEvent> {
        let (ticket, mut events) = self.begin_load();
        let result = fetch_table(backend, &self.table);
        events.extend(self.finish_load(ticket, result));
        events
    }

    pub fn set_search(&mut self, term: &str) -> Vec<ViewEvent> {
        self.search = term.to_owned();
        self.refilter();
        vec![ViewEvent::SearchChanged {
            visible: self.visible.len(),
        }]
    }

    pub fn open_create(&mut self) -> Vec<ViewEvent> {
        let Some(schema) = self.ready_schema() else {
            return self.reject("add a record");
        };
        self.draft = Some(Draft::blank(schema, self.table.scope_id.as_ref()));
        self.set_phase(ViewPhase::Form(FormMode::Create))
    }

    pub fn open_edit(&mut self, row: usize) -> Vec<ViewEvent> {
        let Some(schema) = self.ready_schema() else {
            return self.reject("edit a record");
        };
        let Some(record) = self.rows.get(row) else {
            return vec![unexpected(format!("row {row} is not loaded"))];
        };
        match Draft::from_record(schema, record) {
            Ok(draft) => {
                self.draft = Some(draft);
                self.set_phase(ViewPhase::Form(FormMode::Edit))
            }
            Err(error) => vec![unexpected(format!("{error:#}"))],
        }
    }

    /// Parses `raw` into the open form's `column`.
    pub fn edit_field(&mut self, column: &str, raw: &str) -> Result<()> {
        let (schema, draft) = self.form_parts()?;
        draft.set_input(schema, column, raw)
    }

    pub fn set_field_value(&mut self, column: &str, value: Value) -> Result<()> {
        let (schema, draft) = self.form_parts()?;
        draft.set_value(schema, column, value)
    }

    /// Leaves any modal phase without side effects.
    pub fn cancel(&mut self) -> Vec<ViewEvent> {
        match self.phase {
            ViewPhase::Form(_)
            | ViewPhase::ConfirmDelete(_)
            | ViewPhase::Uploading
            | ViewPhase::Dictating => {
                self.draft = None;
                self.set_phase(ViewPhase::Ready)
            }
            ViewPhase::Loading | ViewPhase::Ready | ViewPhase::Error(_) => Vec::new(),
        }
    }

    pub fn submit(&mut self, backend: &mut dyn Backend) -> Vec<ViewEvent> {
        if !matches!(self.phase, ViewPhase::Form(_)) {
            return vec![unexpected("no form is open".to_owned())];
        }
        let (Some(schema), Some(draft)) = (self.schema.as_ref(), self.draft.as_ref()) else {
            return vec![unexpected("form has no loaded table".to_owned())];
        };
        let payload = match draft.payload(schema) {
            Ok(payload) => payload,
            Err(error) => {
                return vec![ViewEvent::Notice(Notice::failure(
                    FailureKind::Mutation,
                    format!("{error:#}"),
                ))];
            }
        };

        match self.apply_payload(backend, payload) {
            Ok(mut events) => {
                self.draft = None;
                events.extend(self.set_phase(ViewPhase::Ready));
                events
            }
            Err(error) => vec![self.mutation_failed("save", &error)],
        }
    }

    pub fn request_delete(&mut self, row: usize) -> Vec<ViewEvent> {
        let Some(schema) = self.ready_schema() else {
            return self.reject("delete a record");
        };
        let id = self
            .rows
            .get(row)
            .and_then(|record| record.get(schema.id_column()))
            .and_then(RecordId::from_json);
        match id {
            Some(id) => self.set_phase(ViewPhase::ConfirmDelete(id)),
            None => vec![unexpected(format!("row {row} has no identifier to delete"))],
        }
    }

    pub fn confirm_delete(&mut self, backend: &mut dyn Backend) -> Vec<ViewEvent> {
        let ViewPhase::ConfirmDelete(id) = self.phase.clone() else {
            return vec![unexpected("no delete is pending".to_owned())];
        };
        let Some(id_column) = self.schema.as_ref().map(|schema| schema.id_column().to_owned())
        else {
            return vec![unexpected("no table is loaded".to_owned())];
        };
        let table = self.table.remote_name();

        if let Err(error) = backend
            .delete(&table, &id_column, &id)
            .with_context(|| format!("delete `{table}` row {id}"))
        {
            let mut events = vec![self.mutation_failed("delete", &error)];
            events.extend(self.set_phase(ViewPhase::Ready));
            return events;
        }

        tracing::info!(table = %table, id = %id, "record deleted");
        let mut events = Vec::new();
        if let Some(index) = self.position_of(&id_column, &id) {
            self.rows.remove(index);
            self.refilter();
            events.push(ViewEvent::RowRemoved(index));
        }
        events.push(ViewEvent::Notice(Notice::success(format!("deleted record {id}"))));
        events.extend(self.set_phase(ViewPhase::Ready));
        events
    }

    pub fn begin_upload(&mut self) -> Vec<ViewEvent> {
        if self.ready_schema().is_none() {
            return self.reject("import a file");
        }
        self.set_phase(ViewPhase::Uploading)
    }

    /// Completed imports invalidate the cache and reload the table.
    pub fn finish_upload(
        &mut self,
        backend: &mut dyn Backend,
        outcome: ImportOutcome,
    ) -> Vec<ViewEvent> {
        if self.phase != ViewPhase::Uploading {
            return vec![unexpected("no import is in progress".to_owned())];
        }

        match outcome {
            ImportOutcome::Completed { inserted } => {
                tracing::info!(
                    table = %self.table.remote_name(),
                    inserted,
                    "import completed"
                );
                let mut events = vec![
                    ViewEvent::Notice(Notice::success(format!("imported {inserted} records"))),
                    ViewEvent::ReloadRequested,
                ];
                events.extend(self.load(backend));
                events
            }
            ImportOutcome::Cancelled => self.set_phase(ViewPhase::Ready),
            ImportOutcome::Failed(message) => {
                tracing::warn!(
                    table = %self.table.remote_name(),
                    failure = FailureKind::Mutation.as_str(),
                    error = %message,
                    "import failed"
                );
                let mut events = vec![ViewEvent::Notice(Notice::failure(
                    FailureKind::Mutation,
                    message,
                ))];
                events.extend(self.set_phase(ViewPhase::Ready));
                events
            }
        }
    }

    pub fn begin_dictation(&mut self) -> Vec<ViewEvent> {
        if self.ready_schema().is_none() {
            return self.reject("dictate a record");
        }
        self.set_phase(ViewPhase::Dictating)
    }

    pub fn finish_dictation(
        &mut self,
        backend: &mut dyn Backend,
        fields: &FieldMap,
    ) -> Vec<ViewEvent> {
        self.finish_dictation_at(backend, fields, OffsetDateTime::now_utc())
    }

    /// Creates a record from dictated text. `created_at` is stamped with
    /// `now` when the table has it and the dictation did not fill it.
    /// On failure the view stays in [`ViewPhase::Dictating`].
    pub fn finish_dictation_at(
        &mut self,
        backend: &mut dyn Backend,
        fields: &FieldMap,
        now: OffsetDateTime,
    ) -> Vec<ViewEvent> {
        if self.phase != ViewPhase::Dictating {
            return vec![unexpected("dictation is not active".to_owned())];
        }
        let Some(schema) = self.schema.as_ref() else {
            return vec![unexpected("no table is loaded".to_owned())];
        };

        let payload = dictated_draft(schema, self.table.scope_id.as_ref(), fields, now)
            .and_then(|draft| draft.payload(schema));
        let payload = match payload {
            Ok(payload) => payload,
            Err(error) => {
                return vec![ViewEvent::Notice(Notice::failure(
                    FailureKind::Mutation,
                    format!("{error:#}"),
                ))];
            }
        };

        match self.apply_payload(backend, payload) {
            Ok(mut events) => {
                events.extend(self.set_phase(ViewPhase::Ready));
                events
            }
            Err(error) => vec![self.mutation_failed("dictated create", &error)],
        }
    }

    fn apply_payload(
        &mut self,
        backend: &mut dyn Backend,
        payload: FormPayload,
    ) -> Result<Vec<ViewEvent>> {
        let table = self.table.remote_name();
        match payload {
            FormPayload::Insert(row) => {
                let stored = backend
                    .insert(&table, std::slice::from_ref(&row))
                    .with_context(|| format!("insert into `{table}`"))?
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("insert into `{table}` returned no row"))?;
                tracing::info!(table = %table, "record created");
                self.rows.push(stored);
                self.refilter();
                Ok(vec![
                    ViewEvent::RowInserted(self.rows.len() - 1),
                    ViewEvent::Notice(Notice::success("record added")),
                ])
            }
            FormPayload::Update { id, row } => {
                let id_column = self
                    .schema
                    .as_ref()
                    .map(|schema| schema.id_column().to_owned())
                    .ok_or_else(|| anyhow!("no table is loaded"))?;
                let stored = backend
                    .update(&table, &id_column, &id, &row)
                    .with_context(|| format!("update `{table}` row {id}"))?;
                tracing::info!(table = %table, id = %id, "record updated");

                let mut events = Vec::new();
                match self.position_of(&id_column, &id) {
                    Some(index) => {
                        self.rows[index] = stored;
                        events.push(ViewEvent::RowReplaced(index));
                    }
                    None => {
                        self.rows.push(stored);
                        events.push(ViewEvent::RowInserted(self.rows.len() - 1));
                    }
                }
                self.refilter();
                events.push(ViewEvent::Notice(Notice::success(format!(
                    "updated record {id}"
                ))));
                Ok(events)
            }
        }
    }

    fn ready_schema(&self) -> Option<&TableSchema> {
        if self.phase == ViewPhase::Ready {
            self.schema.as_ref()
        } else {
            None
        }
    }

    fn form_parts(&mut self) -> Result<(&TableSchema, &mut Draft)> {
        match (self.schema.as_ref(), self.draft.as_mut()) {
            (Some(schema), Some(draft)) => Ok((schema, draft)),
            _ => Err(anyhow!("no form is open")),
        }
    }

    fn position_of(&self, id_column: &str, id: &RecordId) -> Option<usize> {
        self.rows.iter().position(|row| {
            row.get(id_column)
                .and_then(RecordId::from_json)
                .is_some_and(|candidate| &candidate == id)
        })
    }

    fn refilter(&mut self) {
        self.visible = filter_indices(&self.rows, &self.search);
    }

    fn set_phase(&mut self, phase: ViewPhase) -> Vec<ViewEvent> {
        if self.phase == phase {
            return Vec::new();
        }
        self.phase = phase.clone();
        vec![ViewEvent::PhaseChanged(phase)]
    }

    fn reject(&self, action: &str) -> Vec<ViewEvent> {
        vec![unexpected(format!(
            "cannot {action} while {}",
            self.phase.label()
        ))]
    }

    fn mutation_failed(&self, action: &str, error: &anyhow::Error) -> ViewEvent {
        tracing::warn!(
            table = %self.table.remote_name(),
            failure = FailureKind::Mutation.as_str(),
            error = %format!("{error:#}"),
            "{action} failed"
        );
        ViewEvent::Notice(Notice::failure(
            FailureKind::Mutation,
            format!("{action} failed: {error:#}"),
        ))
    }
}

fn dictated_draft(
    schema: &TableSchema,
    scope: Option<&ScopeId>,
    fields: &FieldMap,
    now: OffsetDateTime,
) -> Result<Draft> {
    let mut draft = Draft::blank(schema, scope);
    for (column, raw) in fields {
        draft
            .set_input(schema, column, raw)
            .with_context(|| format!("dictated `{column}`"))?;
    }
    if schema.has_column(CREATED_AT_COLUMN) && !fields.contains_key(CREATED_AT_COLUMN) {
        let stamp = now
            .format(&Rfc3339)
            .context("format creation timestamp")?;
        draft.set_value(schema, CREATED_AT_COLUMN, Value::String(stamp))?;
    }
    Ok(draft)
}

fn unexpected(message: String) -> ViewEvent {
    tracing::warn!(failure = FailureKind::Unexpected.as_str(), "{message}");
    ViewEvent::Notice(Notice::failure(FailureKind::Unexpected, message))
}
