//! Path-aware validation of inbound JSON records.
//!
//! Wire types derive `Deserialize`; decoding goes through
//! `serde_path_to_error` so a failure names the field it stopped at.

use std::fmt;

use serde::de::{self, Deserialize, DeserializeOwned, Deserializer};
use serde_json::Value;
use serde_path_to_error::Segment;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn key(&self, key: &str) -> Self {
        if self.0.is_empty() {
            Self(key.to_string())
        } else {
            Self(format!("{}.{key}", self.0))
        }
    }

    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{index}]", self.0))
    }

    /// Append `other`, which is relative to `self`.
    pub fn join(&self, other: &FieldPath) -> Self {
        match (self.is_root(), other.is_root()) {
            (_, true) => self.clone(),
            (true, false) => other.clone(),
            (false, false) if other.0.starts_with('[') => Self(format!("{}{}", self.0, other.0)),
            (false, false) => Self(format!("{}.{}", self.0, other.0)),
        }
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("$")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&serde_path_to_error::Path> for FieldPath {
    fn from(path: &serde_path_to_error::Path) -> Self {
        path.iter().fold(Self::root(), |acc, segment| match segment {
            Segment::Seq { index } => acc.index(*index),
            Segment::Map { key } => acc.key(key),
            Segment::Enum { variant } => acc.key(variant),
            _ => acc.key("?"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid field `{path}`: {message}")]
pub struct ValidationError {
    pub path: FieldPath,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: &FieldPath, message: impl Into<String>) -> Self {
        Self {
            path: path.clone(),
            message: message.into(),
        }
    }

    /// Build from a serde failure at `path`. Errors that name a field of the
    /// struct being decoded (serde's `missing field`, or a [`field_error`]
    /// raised by a cross-field check) are moved onto that field.
    fn from_serde(path: FieldPath, message: String) -> Self {
        if let Some(field) = quoted_after(&message, "missing field `") {
            let path = path.key(field);
            return Self { path, message };
        }
        if let Some(field) = quoted_after(&message, FIELD_ERROR_PREFIX) {
            let rest = message[FIELD_ERROR_PREFIX.len() + field.len()..]
                .trim_start_matches("`: ")
                .to_string();
            return Self {
                path: path.join(&FieldPath(field.to_string())),
                message: rest,
            };
        }
        Self { path, message }
    }

    /// Message form that survives being re-raised through an outer decoder.
    fn into_nested_message(self) -> String {
        if self.path.is_root() {
            self.message
        } else {
            field_error(self.path.as_str(), self.message)
        }
    }
}

const FIELD_ERROR_PREFIX: &str = "invalid field `";

fn quoted_after<'a>(message: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = message.strip_prefix(prefix)?;
    rest.split_once('`').map(|(field, _)| field)
}

/// Message for a cross-field check failing inside a `TryFrom` conversion.
/// Validation reports it at `field` relative to the record being built.
pub fn field_error(field: &str, message: impl fmt::Display) -> String {
    format!("{FIELD_ERROR_PREFIX}{field}`: {message}")
}

pub fn parse<T: DeserializeOwned>(value: &Value) -> Result<T, ValidationError> {
    parse_at(value, &FieldPath::root())
}

/// Decode `value`, reporting paths relative to `base`.
pub fn parse_at<T: DeserializeOwned>(value: &Value, base: &FieldPath) -> Result<T, ValidationError> {
    serde_path_to_error::deserialize(value).map_err(|e| {
        let path = base.join(&FieldPath::from(e.path()));
        ValidationError::from_serde(path, e.into_inner().to_string())
    })
}

/// Decode a buffered `value` from inside a hand-written `Deserialize` impl.
/// The inner field path is kept so the outer decoder can extend it.
pub fn decode_buffered<T: DeserializeOwned, E: de::Error>(value: &Value) -> Result<T, E> {
    parse(value).map_err(|e| E::custom(e.into_nested_message()))
}

pub fn parse_str<T: DeserializeOwned>(input: &str) -> Result<T, ValidationError> {
    let value: Value = serde_json::from_str(input)
        .map_err(|e| ValidationError::new(&FieldPath::root(), format!("malformed JSON: {e}")))?;
    parse(&value)
}

/// `#[serde(default, deserialize_with = "non_null")]`: absent is allowed, an
/// explicit `null` is not.
pub fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// `#[serde(deserialize_with = "nullable")]`: the key must be present and
/// may be `null`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}
