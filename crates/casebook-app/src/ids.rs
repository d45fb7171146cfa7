// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Scalar key as stored by the backend: integer serial or text (uuid, code).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Int(i64),
    Text(String),
}

impl KeyValue {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_i64().map(Self::Int),
            Value::String(text) if !text.trim().is_empty() => Some(Self::Text(text.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Int(value) => Value::from(*value),
            Self::Text(value) => Value::String(value.clone()),
        }
    }

    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(value) => Self::Int(value),
            Err(_) => Self::Text(trimmed.to_owned()),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

macro_rules! key_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(KeyValue);

        impl $name {
            pub const fn new(value: KeyValue) -> Self {
                Self(value)
            }

            pub const fn get(&self) -> &KeyValue {
                &self.0
            }

            pub fn from_json(value: &Value) -> Option<Self> {
                KeyValue::from_json(value).map(Self)
            }

            pub fn to_json(&self) -> Value {
                self.0.to_json()
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(KeyValue::Int(value))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(KeyValue::parse(value))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

key_id!(RecordId);
key_id!(ScopeId);
