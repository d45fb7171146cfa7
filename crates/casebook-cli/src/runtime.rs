// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use casebook_app::{Backend, ImportOutcome, TableDescriptor, TableSchema};
use std::path::Path;

/// Hands the terminal loop a live backend and routes CSV imports through it.
pub struct CaseRuntime {
    backend: Box<dyn Backend>,
}

impl CaseRuntime {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }
}

impl casebook_tui::AppRuntime for CaseRuntime {
    fn backend(&mut self) -> &mut dyn Backend {
        self.backend.as_mut()
    }

    fn import_file(
        &mut self,
        table: &TableDescriptor,
        schema: &TableSchema,
        path: &Path,
    ) -> ImportOutcome {
        casebook_backend::import_csv(self.backend.as_mut(), table, schema, path)
    }
}
