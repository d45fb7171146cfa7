// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! CSV bulk import: a header row naming columns, then one record per line.

use anyhow::{Context, Result, bail};
use casebook_app::{
    Backend, Draft, FormPayload, ImportOutcome, Record, TableDescriptor, TableSchema,
};
use csv::{ReaderBuilder, Trim};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Parses CSV text into insert-ready rows. Every cell goes through the same
/// input coercion as the record form; blank cells become `null`.
pub fn read_csv<R: Read>(
    reader: R,
    schema: &TableSchema,
    table: &TableDescriptor,
) -> Result<Vec<Record>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(false)
        .from_reader(reader);

    let headers = reader.headers().context("read CSV header row")?.clone();
    let mut seen = BTreeSet::new();
    for header in &headers {
        if header.is_empty() {
            bail!("CSV header has an empty column name");
        }
        if !schema.has_column(header) {
            bail!(
                "CSV column `{header}` is not in `{}` -- expected some of: {}",
                schema.table(),
                schema.column_names().collect::<Vec<_>>().join(", ")
            );
        }
        if !seen.insert(header) {
            bail!("CSV column `{header}` appears twice");
        }
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("read CSV row")?;
        let line = record.position().map_or(0, csv::Position::line);

        let mut draft = Draft::blank(schema, table.scope_id.as_ref());
        for (column, cell) in headers.iter().zip(record.iter()) {
            draft
                .set_input(schema, column, cell)
                .with_context(|| format!("line {line}, column `{column}`"))?;
        }
        match draft.payload(schema)? {
            FormPayload::Insert(row) => rows.push(row),
            FormPayload::Update { .. } => bail!("line {line}: import only creates records"),
        }
    }
    Ok(rows)
}

/// Reads `path` and inserts every row in one batch. Nothing is inserted when
/// any line fails to parse.
pub fn import_csv(
    backend: &mut dyn Backend,
    table: &TableDescriptor,
    schema: &TableSchema,
    path: &Path,
) -> ImportOutcome {
    match try_import(backend, table, schema, path) {
        Ok(inserted) => {
            tracing::info!(
                table = %schema.table(),
                path = %path.display(),
                inserted,
                "csv imported"
            );
            ImportOutcome::Completed { inserted }
        }
        Err(error) => {
            tracing::warn!(
                table = %schema.table(),
                path = %path.display(),
                error = %format!("{error:#}"),
                "csv import failed"
            );
            ImportOutcome::Failed(format!("{error:#}"))
        }
    }
}

fn try_import(
    backend: &mut dyn Backend,
    table: &TableDescriptor,
    schema: &TableSchema,
    path: &Path,
) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rows = read_csv(file, schema, table).with_context(|| format!("parse {}", path.display()))?;
    if rows.is_empty() {
        bail!("{} has no data rows -- add records below the header", path.display());
    }
    let inserted = backend
        .insert(&table.remote_name(), &rows)
        .with_context(|| format!("insert {} rows into `{}`", rows.len(), table.remote_name()))?;
    Ok(inserted.len())
}

#[cfg(test)]
mod tests {
    use super::read_csv;
    use casebook_app::{ScopeId, TableDescriptor, TableSchema};
    use serde_json::{Value, json};

    fn students() -> TableSchema {
        let columns = ["id", "name", "dob", "days_of_week", "is_active", "center_id"]
            .map(str::to_owned)
            .to_vec();
        TableSchema::resolve("students", &columns, &[]).expect("schema")
    }

    #[test]
    fn cells_are_coerced_like_form_input() {
        let csv = "name,dob,days_of_week,is_active\nAsha,2010-04-01,\"1,3\",yes\nBob,,,\n";
        let rows = read_csv(csv.as_bytes(), &students(), &TableDescriptor::new("students"))
            .expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["days_of_week"], json!(["1", "3"]));
        assert_eq!(rows[0]["is_active"], json!(true));
        assert_eq!(rows[1]["dob"], Value::Null);
        assert!(!rows[0].contains_key("id"));
    }

    #[test]
    fn scope_fills_center_column() {
        let table = TableDescriptor::new("students").with_scope(Some(ScopeId::from(2)));
        let rows = read_csv("name\nAsha\n".as_bytes(), &students(), &table).expect("rows");
        assert_eq!(rows[0]["center_id"], json!(2));
    }

    #[test]
    fn unknown_and_duplicate_headers_are_rejected() {
        let table = TableDescriptor::new("students");
        let error = read_csv("name,nickname\nA,B\n".as_bytes(), &students(), &table)
            .expect_err("unknown header");
        assert!(error.to_string().contains("`nickname` is not in `students`"));

        let error = read_csv("name,name\nA,B\n".as_bytes(), &students(), &table)
            .expect_err("duplicate header");
        assert!(error.to_string().contains("appears twice"));
    }

    #[test]
    fn bad_cell_names_line_and_column() {
        let csv = "name,dob\nAsha,2010-04-01\nBob,someday\n";
        let error = read_csv(csv.as_bytes(), &students(), &TableDescriptor::new("students"))
            .expect_err("bad date");
        let message = format!("{error:#}");
        assert!(message.contains("line 3, column `dob`"), "{message}");
    }
}
