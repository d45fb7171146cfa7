// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use casebook_app::{Backend, Record, RecordId, SCOPE_COLUMN, ScopeFilter, ScopeId, TableSchema};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use time::macros::{date, datetime};
use time::{Date, Duration, OffsetDateTime};

pub const STUDENT_COLUMNS: [&str; 16] = [
    "id",
    "first_name",
    "last_name",
    "dob",
    "gender",
    "blood_group",
    "center_id",
    "days_of_week",
    "timings",
    "primary_diagnosis",
    "is_active",
    "status",
    "transport",
    "guardian_email",
    "admission_date",
    "created_at",
];

pub const EDUCATOR_COLUMNS: [&str; 11] = [
    "id",
    "name",
    "email",
    "phone_number",
    "session_type",
    "days_of_week",
    "center_id",
    "is_active",
    "joining_date",
    "comments",
    "created_at",
];

/// Keyed by `employee_id` rather than `id`.
pub const EMPLOYEE_COLUMNS: [&str; 11] = [
    "employee_id",
    "first_name",
    "last_name",
    "email",
    "employment_type",
    "status",
    "center_id",
    "password",
    "date_of_joining",
    "address",
    "created_at",
];

const FIRST_NAMES: [&str; 16] = [
    "Asha", "Rohan", "Meera", "Kabir", "Ananya", "Vikram", "Isha", "Arjun", "Nisha", "Dev",
    "Priya", "Sameer", "Tara", "Neel", "Leela", "Omar",
];
const LAST_NAMES: [&str; 12] = [
    "Rao", "Sharma", "Iyer", "Khan", "Menon", "Patel", "Das", "Nair", "Singh", "Joshi", "Pillai",
    "Bose",
];
const GENDERS: [&str; 4] = ["Male", "Female", "Other", "Prefer not to say"];
const BLOOD_GROUPS: [&str; 8] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];
const STUDENT_STATUSES: [&str; 3] = ["Active", "Inactive", "Graduated"];
const EMPLOYEE_STATUSES: [&str; 3] = ["Active", "Inactive", "On Leave"];
const TRANSPORTS: [&str; 5] = [
    "School Bus",
    "Parent Drop",
    "Public Transport",
    "Self",
    "Not Required",
];
const SESSION_TYPES: [&str; 4] = ["Individual", "Group", "Online", "Hybrid"];
const EMPLOYMENT_TYPES: [&str; 5] = ["Full-time", "Part-time", "Contract", "Intern", "Volunteer"];
const DIAGNOSES: [&str; 6] = [
    "Autism spectrum disorder",
    "ADHD",
    "Down syndrome",
    "Cerebral palsy",
    "Speech delay",
    "Learning disability",
];
const TIMINGS: [&str; 4] = ["9:00", "11:00", "14:00", "16:00"];
const STREETS: [&str; 8] = [
    "MG Road",
    "Park Street",
    "Lake View",
    "Hill Road",
    "Station Road",
    "Temple Street",
    "Church Lane",
    "Market Road",
];
const CENTERS: [i64; 2] = [1, 2];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Deterministic rows for the three demo tables. Generated rows carry no
/// identifier; the backend assigns it on insert.
#[derive(Debug, Clone)]
pub struct CaseFaker {
    rng: DeterministicRng,
    seed: u64,
}

impl CaseFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
        }
    }

    pub const fn seed(&self) -> u64 {
        self.seed
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn student(&mut self) -> Record {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let dob = self.date_between(date!(2008 - 01 - 01), date!(2020 - 12 - 31));
        let admitted = self.date_between(date!(2021 - 06 - 01), date!(2025 - 12 - 31));
        object(json!({
            "first_name": first,
            "last_name": last,
            "dob": iso(dob),
            "gender": self.pick(&GENDERS),
            "blood_group": self.pick(&BLOOD_GROUPS),
            "center_id": self.center(),
            "days_of_week": self.weekdays(),
            "timings": self.timings(),
            "primary_diagnosis": self.pick(&DIAGNOSES),
            "is_active": self.rng.bool(),
            "status": self.pick(&STUDENT_STATUSES),
            "transport": self.pick(&TRANSPORTS),
            "guardian_email": email(last, first),
            "admission_date": iso(admitted),
            "created_at": self.created_at(),
        }))
    }

    pub fn educator(&mut self) -> Record {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let joined = self.date_between(date!(2015 - 01 - 01), date!(2025 - 12 - 31));
        object(json!({
            "name": format!("{first} {last}"),
            "email": email(first, last),
            "phone_number": self.phone(),
            "session_type": self.pick(&SESSION_TYPES),
            "days_of_week": self.weekdays(),
            "center_id": self.center(),
            "is_active": self.rng.bool(),
            "joining_date": iso(joined),
            "comments": self.sentence(),
            "created_at": self.created_at(),
        }))
    }

    pub fn employee(&mut self) -> Record {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let joined = self.date_between(date!(2012 - 01 - 01), date!(2025 - 12 - 31));
        let house = self.int_n(200) + 1;
        object(json!({
            "first_name": first,
            "last_name": last,
            "email": email(first, last),
            "employment_type": self.pick(&EMPLOYMENT_TYPES),
            "status": self.pick(&EMPLOYEE_STATUSES),
            "center_id": self.center(),
            "password": format!("pw-{:06}", self.rng.next_u64() % 1_000_000),
            "date_of_joining": iso(joined),
            "address": format!("{house} {}", self.pick(&STREETS)),
            "created_at": self.created_at(),
        }))
    }

    /// Row for one of the demo tables, `None` for anything else.
    pub fn row_for(&mut self, table: &str) -> Option<Record> {
        match table {
            "students" => Some(self.student()),
            "educators" => Some(self.educator()),
            "employees" => Some(self.employee()),
            _ => None,
        }
    }

    pub fn date_between(&mut self, start: Date, end: Date) -> Date {
        let span = (end - start).whole_days();
        if span <= 0 {
            return start;
        }
        let offset = (self.rng.next_u64() % (span as u64 + 1)) as i64;
        start.checked_add(Duration::days(offset)).unwrap_or(start)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn center(&mut self) -> i64 {
        CENTERS[self.rng.int_n(CENTERS.len())]
    }

    fn weekdays(&mut self) -> Value {
        let days: Vec<Value> = (1..=7)
            .filter(|_| self.rng.bool())
            .map(|day: u8| Value::String(day.to_string()))
            .collect();
        if days.is_empty() {
            return json!(["1"]);
        }
        Value::Array(days)
    }

    fn timings(&mut self) -> Value {
        let count = self.int_n(2) + 1;
        let start = self.int_n(TIMINGS.len() - count + 1);
        Value::Array(
            TIMINGS[start..start + count]
                .iter()
                .map(|slot| Value::String((*slot).to_owned()))
                .collect(),
        )
    }

    fn phone(&mut self) -> i64 {
        9_000_000_000 + (self.rng.next_u64() % 1_000_000_000) as i64
    }

    fn created_at(&mut self) -> String {
        let offset = (self.rng.next_u64() % (365 * 24 * 3600)) as i64;
        let stamp = reference_now() - Duration::seconds(offset);
        stamp
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| fixture_datetime().to_owned())
    }

    fn sentence(&mut self) -> String {
        const WORDS: [&str; 16] = [
            "patient",
            "structured",
            "sessions",
            "prefers",
            "mornings",
            "group",
            "speech",
            "therapy",
            "progress",
            "review",
            "parents",
            "visual",
            "schedule",
            "motor",
            "skills",
            "weekly",
        ];

        let count = 4 + self.int_n(6);
        let mut sentence = (0..count)
            .map(|_| self.pick(&WORDS))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        sentence
    }
}

/// Backend operation that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailPoint {
    Columns,
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Record>,
    next_id: i64,
}

/// In-process stand-in for the collection API.
///
/// Integer identifiers are assigned on insert when the key column is null or
/// absent. Inserted rows are widened to every column, as a database would.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    tables: BTreeMap<String, MemoryTable>,
    failures: BTreeSet<FailPoint>,
    calls: Vec<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, columns: &[&str], rows: Vec<Record>) -> Self {
        self.add_table(name, columns, rows);
        self
    }

    pub fn add_table(&mut self, name: &str, columns: &[&str], rows: Vec<Record>) {
        let columns: Vec<String> = columns.iter().map(|column| (*column).to_owned()).collect();
        let mut table = MemoryTable {
            columns,
            rows: Vec::new(),
            next_id: 1,
        };
        for row in rows {
            table.store(name, row);
        }
        self.tables.insert(name.to_owned(), table);
    }

    /// Students, educators and employees with `rows` generated records each.
    pub fn demo(seed: u64, rows: usize) -> Self {
        let mut faker = CaseFaker::new(seed);
        let mut backend = Self::new();
        for (name, columns) in [
            ("students", &STUDENT_COLUMNS[..]),
            ("educators", &EDUCATOR_COLUMNS[..]),
            ("employees", &EMPLOYEE_COLUMNS[..]),
        ] {
            let generated = (0..rows).filter_map(|_| faker.row_for(name)).collect();
            backend.add_table(name, columns, generated);
        }
        backend
    }

    pub fn fail(&mut self, point: FailPoint) {
        self.failures.insert(point);
    }

    pub fn heal(&mut self, point: FailPoint) {
        self.failures.remove(&point);
    }

    pub fn rows(&self, table: &str) -> &[Record] {
        self.tables
            .get(table)
            .map(|table| table.rows.as_slice())
            .unwrap_or_default()
    }

    /// One entry per backend call, e.g. `insert students`.
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    fn enter(&mut self, point: FailPoint, table: &str) -> Result<&mut MemoryTable> {
        let verb = match point {
            FailPoint::Columns => "columns",
            FailPoint::Select => "select",
            FailPoint::Insert => "insert",
            FailPoint::Update => "update",
            FailPoint::Delete => "delete",
        };
        self.calls.push(format!("{verb} {table}"));
        if self.failures.contains(&point) {
            bail!("injected {verb} failure for `{table}`");
        }
        match self.tables.get_mut(table) {
            Some(found) => Ok(found),
            None => bail!("relation \"public.{table}\" does not exist"),
        }
    }
}

impl MemoryTable {
    fn id_column(&self, name: &str) -> String {
        TableSchema::resolve(name, &self.columns, &[])
            .map(|schema| schema.id_column().to_owned())
            .unwrap_or_else(|_| "id".to_owned())
    }

    fn check_columns(&self, name: &str, row: &Record) -> Result<()> {
        for key in row.keys() {
            if !self.columns.iter().any(|column| column == key) {
                bail!("could not find the `{key}` column of `{name}`");
            }
        }
        Ok(())
    }

    fn store(&mut self, name: &str, row: Record) -> Record {
        let id_column = self.id_column(name);
        let mut stored = Record::new();
        for column in &self.columns {
            stored.insert(
                column.clone(),
                row.get(column).cloned().unwrap_or(Value::Null),
            );
        }

        match stored.get(&id_column).and_then(RecordId::from_json) {
            Some(id) => {
                if let casebook_app::KeyValue::Int(value) = id.get() {
                    self.next_id = self.next_id.max(value + 1);
                }
            }
            None => {
                stored.insert(id_column, json!(self.next_id));
                self.next_id += 1;
            }
        }
        self.rows.push(stored.clone());
        stored
    }

    fn position(&self, id_column: &str, id: &RecordId) -> Option<usize> {
        self.rows.iter().position(|row| {
            row.get(id_column)
                .and_then(RecordId::from_json)
                .is_some_and(|candidate| &candidate == id)
        })
    }
}

impl Backend for MemoryBackend {
    fn fetch_columns(&mut self, table: &str) -> Result<Vec<String>> {
        Ok(self.enter(FailPoint::Columns, table)?.columns.clone())
    }

    fn select(&mut self, table: &str, scope: Option<&ScopeFilter>) -> Result<Vec<Record>> {
        let found = self.enter(FailPoint::Select, table)?;
        Ok(found
            .rows
            .iter()
            .filter(|row| scope.is_none_or(|filter| filter.matches(row)))
            .cloned()
            .collect())
    }

    fn insert(&mut self, table: &str, rows: &[Record]) -> Result<Vec<Record>> {
        let found = self.enter(FailPoint::Insert, table)?;
        for row in rows {
            found.check_columns(table, row)?;
        }
        Ok(rows
            .iter()
            .map(|row| found.store(table, row.clone()))
            .collect())
    }

    fn update(
        &mut self,
        table: &str,
        id_column: &str,
        id: &RecordId,
        row: &Record,
    ) -> Result<Record> {
        let found = self.enter(FailPoint::Update, table)?;
        found.check_columns(table, row)?;
        let Some(index) = found.position(id_column, id) else {
            bail!("no `{table}` row with {id_column} = {id}");
        };
        let stored = &mut found.rows[index];
        for (key, value) in row {
            stored.insert(key.clone(), value.clone());
        }
        Ok(stored.clone())
    }

    fn delete(&mut self, table: &str, id_column: &str, id: &RecordId) -> Result<()> {
        let found = self.enter(FailPoint::Delete, table)?;
        if let Some(index) = found.position(id_column, id) {
            found.rows.remove(index);
        }
        Ok(())
    }
}

/// Scope filter on the demo center column.
pub fn center_scope(center: i64) -> ScopeFilter {
    ScopeFilter {
        column: SCOPE_COLUMN.to_owned(),
        value: ScopeId::from(center),
    }
}

/// Writes `contents` to `name` inside a fresh temp dir.
pub fn temp_file(name: &str, contents: &str) -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join(name);
    std::fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok((dir, path))
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}

pub fn fixture_now() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

/// Object literal as a [`Record`]; anything else yields an empty record.
pub fn object(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn reference_now() -> OffsetDateTime {
    datetime!(2026-01-01 0:00 UTC)
}

fn iso(date: Date) -> String {
    casebook_app::format::format_iso_date(date).unwrap_or_default()
}

fn email(first: &str, second: &str) -> String {
    format!(
        "{}.{}@example.org",
        first.to_ascii_lowercase(),
        second.to_ascii_lowercase()
    )
}
