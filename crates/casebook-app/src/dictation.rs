// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Turns a spoken-style transcript into raw field values.
//!
//! `name is Asha, dob is 2010-04-01; gender: female` yields three fields.
//! A segment with no `:` or ` is ` continues the previous value, so
//! `days of week is 1, 3` keeps both days.

use std::collections::BTreeMap;

use crate::schema::TableSchema;

/// Column name to raw (unparsed) text.
pub type FieldMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictation {
    pub fields: FieldMap,
    /// Spoken field names with no matching column.
    pub unmatched: Vec<String>,
}

pub fn parse_transcript(transcript: &str, schema: &TableSchema) -> Dictation {
    let mut dictation = Dictation::default();
    // Last matched column; `None` after an unmatched field so its
    // continuation segments are dropped with it.
    let mut current: Option<String> = None;

    for segment in transcript.split([',', ';', '\n']) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        match split_segment(segment) {
            Some((spoken, value)) => match match_column(schema, spoken) {
                Some(column) => {
                    dictation.fields.insert(column.clone(), value.to_owned());
                    current = Some(column);
                }
                None => {
                    dictation.unmatched.push(spoken.to_owned());
                    current = None;
                }
            },
            None => {
                if let Some(value) = current
                    .as_ref()
                    .and_then(|column| dictation.fields.get_mut(column))
                {
                    if !value.is_empty() {
                        value.push_str(", ");
                    }
                    value.push_str(segment);
                }
            }
        }
    }

    dictation
}

fn split_segment(segment: &str) -> Option<(&str, &str)> {
    let colon = segment.find(':').map(|at| (at, 1));
    let lower = segment.to_ascii_lowercase();
    let is = lower.find(" is ").map(|at| (at, 4));

    let (at, width) = match (colon, is) {
        (Some(colon), Some(is)) => colon.min(is),
        (Some(found), None) | (None, Some(found)) => found,
        (None, None) => return None,
    };
    let spoken = segment[..at].trim();
    if spoken.is_empty() {
        return None;
    }
    Some((spoken, segment[at + width..].trim()))
}

fn match_column(schema: &TableSchema, spoken: &str) -> Option<String> {
    let wanted = spoken
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_ascii_lowercase();
    schema
        .column_names()
        .find(|name| name.to_ascii_lowercase() == wanted)
        .map(str::to_owned)
}
