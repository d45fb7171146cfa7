// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Display text, edit controls, and input coercion per [`FieldKind`].
//!
//! [`parse_input`] is the only place user text becomes a stored value: the
//! record form, CSV import, and dictation all route through it.

use anyhow::{Result, bail};
use serde_json::{Number, Value};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::schema::{ArrayKind, ColumnSpec, FieldKind, WEEKDAYS, weekday_code, weekday_label};

pub const EMPTY_DISPLAY: &str = "-";
pub const PASSWORD_MASK: &str = "••••••••";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditControl {
    DatePicker,
    MultiSelect(&'static [(&'static str, &'static str)]),
    CommaList,
    TriState,
    Select(&'static [&'static str]),
    Masked,
    MultiLine,
    Number,
    Email,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldControl {
    pub control: EditControl,
    pub label: String,
    pub placeholder: String,
}

/// `first_name` becomes `First Name`.
pub fn humanize(name: &str) -> String {
    name.split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn display(kind: FieldKind, value: Option<&Value>) -> String {
    let value = match value {
        None | Some(Value::Null) => {
            return match kind {
                FieldKind::Password => PASSWORD_MASK.to_owned(),
                _ => EMPTY_DISPLAY.to_owned(),
            };
        }
        Some(value) => value,
    };

    match kind {
        FieldKind::Password => PASSWORD_MASK.to_owned(),
        FieldKind::Date => value
            .as_str()
            .and_then(parse_date)
            .and_then(format_date)
            .unwrap_or_else(|| EMPTY_DISPLAY.to_owned()),
        FieldKind::Array(array_kind) => {
            let items = array_items(value);
            if items.is_empty() {
                return EMPTY_DISPLAY.to_owned();
            }
            items
                .iter()
                .map(|item| match array_kind {
                    ArrayKind::Weekdays => weekday_label(item).unwrap_or(item).to_owned(),
                    ArrayKind::Free => item.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ")
        }
        FieldKind::Boolean => match value {
            Value::Bool(true) => "Yes".to_owned(),
            Value::Bool(false) => "No".to_owned(),
            _ => EMPTY_DISPLAY.to_owned(),
        },
        _ => scalar_text(value),
    }
}

pub fn edit_control(column: &ColumnSpec) -> FieldControl {
    let label = humanize(&column.name);
    let spaced = column.name.replace('_', " ");
    let (control, placeholder) = match column.kind {
        FieldKind::Date => (EditControl::DatePicker, "yyyy-MM-dd".to_owned()),
        FieldKind::Array(ArrayKind::Weekdays) => {
            (EditControl::MultiSelect(&WEEKDAYS), "Select days".to_owned())
        }
        FieldKind::Array(ArrayKind::Free) => (
            EditControl::CommaList,
            "Enter comma-separated values".to_owned(),
        ),
        FieldKind::Boolean => (EditControl::TriState, "Select".to_owned()),
        FieldKind::Choice(choice) => (
            EditControl::Select(choice.options()),
            format!("Select {label}"),
        ),
        FieldKind::Password => (EditControl::Masked, "Enter password".to_owned()),
        FieldKind::LongText => (EditControl::MultiLine, format!("Enter {spaced}")),
        FieldKind::Numeric => (EditControl::Number, format!("Enter {spaced}")),
        FieldKind::Email => (EditControl::Email, format!("Enter {spaced}")),
        FieldKind::Text => (EditControl::Text, format!("Enter {spaced}")),
    };
    FieldControl {
        control,
        label,
        placeholder,
    }
}

/// Text placed in an edit box for the current value. Passwords always
/// start blank.
pub fn edit_text(kind: FieldKind, value: Option<&Value>) -> String {
    let value = match value {
        None | Some(Value::Null) => return String::new(),
        Some(_) if kind == FieldKind::Password => return String::new(),
        Some(value) => value,
    };

    match kind {
        FieldKind::Array(array_kind) => array_items(value)
            .iter()
            .map(|item| match array_kind {
                ArrayKind::Weekdays => weekday_label(item).unwrap_or(item).to_owned(),
                ArrayKind::Free => item.clone(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        FieldKind::Boolean => match value {
            Value::Bool(true) => "yes".to_owned(),
            Value::Bool(false) => "no".to_owned(),
            other => scalar_text(other),
        },
        _ => scalar_text(value),
    }
}

/// Converts user-entered text into the value stored for a column.
///
/// Blank input is always `null`, never an empty string.
pub fn parse_input(kind: FieldKind, raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    match kind {
        FieldKind::Date => parse_date_input(trimmed),
        FieldKind::Array(array_kind) => parse_array_input(array_kind, trimmed),
        FieldKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Ok(Value::Bool(true)),
            "no" | "n" | "false" | "0" => Ok(Value::Bool(false)),
            _ => bail!("{trimmed:?} is not yes or no -- enter yes, no, or leave it empty"),
        },
        FieldKind::Choice(choice) => match choice.canonical(trimmed) {
            Some(option) => Ok(Value::String(option.to_owned())),
            None => bail!(
                "{trimmed:?} is not a valid {} -- choose one of: {}",
                choice.field_name().replace('_', " "),
                choice.options().join(", ")
            ),
        },
        FieldKind::Numeric => parse_number(trimmed)
            .ok_or_else(|| anyhow::anyhow!("{trimmed:?} is not a number -- enter digits only")),
        FieldKind::Password | FieldKind::LongText | FieldKind::Email | FieldKind::Text => {
            Ok(Value::String(raw.to_owned()))
        }
    }
}

/// Storage coercion applied at submit time to new records and to the
/// columns an edit changed.
///
/// Blank strings become `null`; string values held by array columns are split
/// the same way [`parse_input`] splits them. Anything else is sent unchanged.
pub fn coerce(kind: FieldKind, value: &Value) -> Value {
    match value {
        Value::String(text) if text.trim().is_empty() => Value::Null,
        Value::String(text) if matches!(kind, FieldKind::Array(_)) => {
            parse_input(kind, text).unwrap_or_else(|_| value.clone())
        }
        _ => value.clone(),
    }
}

/// Array-ish value as a list of strings. JSON-looking strings are parsed
/// first; malformed JSON falls back to a comma list.
pub fn array_items(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(scalar_text)
            .collect(),
        Value::String(text) => split_array_text(text)
            .iter()
            .map(scalar_text)
            .collect(),
        other => vec![scalar_text(other)],
    }
}

pub fn parse_date(raw: &str) -> Option<Date> {
    let trimmed = raw.trim();
    let iso = format_description!("[year]-[month]-[day]");
    if let Ok(date) = Date::parse(trimmed, &iso) {
        return Some(date);
    }
    if let Ok(timestamp) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(timestamp.date());
    }

    // Postgres `timestamp` without zone: `2024-01-31T10:00:00` or `2024-01-31 10:00:00`,
    // optionally with fractional seconds.
    let (day, separator, time) = (
        trimmed.get(..10)?,
        trimmed.get(10..11)?,
        trimmed.get(11..)?,
    );
    if separator != "T" && separator != " " {
        return None;
    }
    let normalized = format!("{day}T{time}");
    let whole = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let fractional =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    PrimitiveDateTime::parse(&normalized, &whole)
        .or_else(|_| PrimitiveDateTime::parse(&normalized, &fractional))
        .ok()
        .map(PrimitiveDateTime::date)
}

pub fn format_date(date: Date) -> Option<String> {
    date.format(&format_description!(
        "[month repr:long] [day padding:none], [year]"
    ))
    .ok()
}

pub fn format_iso_date(date: Date) -> Option<String> {
    date.format(&format_description!("[year]-[month]-[day]")).ok()
}

fn parse_date_input(trimmed: &str) -> Result<Value> {
    let Some(date) = parse_date(trimmed) else {
        bail!("{trimmed:?} is not a date -- use yyyy-MM-dd or a full timestamp");
    };
    if trimmed.len() > 10 {
        // Timestamps keep their time component.
        return Ok(Value::String(trimmed.to_owned()));
    }
    match format_iso_date(date) {
        Some(iso) => Ok(Value::String(iso)),
        None => bail!("cannot format date {trimmed:?}"),
    }
}

fn parse_array_input(kind: ArrayKind, trimmed: &str) -> Result<Value> {
    let items = split_array_text(trimmed);
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match kind {
            ArrayKind::Weekdays => {
                let text = scalar_text(&item);
                let Some(code) = weekday_code(&text) else {
                    bail!("{text:?} is not a weekday -- use 1-7 or a day name");
                };
                out.push(Value::String(code.to_owned()));
            }
            ArrayKind::Free => match item {
                Value::String(text) => {
                    out.push(parse_number(&text).unwrap_or(Value::String(text)));
                }
                other => out.push(other),
            },
        }
    }

    if out.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::Array(out))
}

fn split_array_text(text: &str) -> Vec<Value> {
    let trimmed = text.trim();
    let mut list = trimmed;
    if let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Array(items)) => return items,
            Ok(_) | Err(_) => {
                tracing::debug!(input = trimmed, "array text is not JSON; splitting on commas");
                list = inner;
            }
        }
    }

    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| Value::String(item.to_owned()))
        .collect()
}

fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(value) = text.parse::<i64>() {
        return Some(Value::from(value));
    }
    text.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}
