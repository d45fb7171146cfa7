// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;

use crate::ids::RecordId;
use crate::model::{Record, ScopeFilter};

/// Collection API the table view reads from and writes to.
///
/// Calls are blocking. Implementations return the stored representation of
/// written rows so backend-assigned values (ids, defaults) reach the cache.
pub trait Backend {
    /// Column names of `table` in declared order.
    fn fetch_columns(&mut self, table: &str) -> Result<Vec<String>>;
    fn select(&mut self, table: &str, scope: Option<&ScopeFilter>) -> Result<Vec<Record>>;
    fn insert(&mut self, table: &str, rows: &[Record]) -> Result<Vec<Record>>;
    fn update(
        &mut self,
        table: &str,
        id_column: &str,
        id: &RecordId,
        row: &Record,
    ) -> Result<Record>;
    fn delete(&mut self, table: &str, id_column: &str, id: &RecordId) -> Result<()>;
}
