// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod backend;
pub mod dictation;
pub mod format;
pub mod forms;
pub mod ids;
pub mod model;
pub mod schema;
pub mod search;
pub mod state;
pub mod view;

pub use backend::*;
pub use dictation::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use schema::*;
pub use state::*;
pub use view::*;
