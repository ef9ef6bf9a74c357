//! Decoding of the optional `notes` field
//!
//! Producers send notes either as a bare legacy string or as an object
//! carrying a `comment` field. Both collapse to an optional free-text
//! comment; any other JSON shape is rejected rather than coerced.

use crate::error::DecodeError;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Shape of a raw `notes` token before normalization
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawNotes<'a> {
    Null,
    String(&'a str),
    Object(&'a Map<String, Value>),
    Other(&'static str),
}

impl<'a> RawNotes<'a> {
    /// Classify a JSON value, treating a missing field as null
    pub fn classify(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => RawNotes::Null,
            Some(Value::String(s)) => RawNotes::String(s),
            Some(Value::Object(map)) => RawNotes::Object(map),
            Some(other) => RawNotes::Other(token_kind(other)),
        }
    }
}

/// Name of the JSON token kind, as reported in decode errors
pub fn token_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Normalize a raw `notes` value into an optional comment.
///
/// ```
/// use note_relay_core::notes::decode_notes;
/// use serde_json::json;
///
/// assert_eq!(decode_notes(Some(&json!("hello"))).unwrap(), Some("hello".to_string()));
/// assert_eq!(decode_notes(Some(&json!({"comment": null}))).unwrap(), None);
/// assert!(decode_notes(Some(&json!(42))).is_err());
/// ```
pub fn decode_notes(value: Option<&Value>) -> Result<Option<String>, DecodeError> {
    match RawNotes::classify(value) {
        RawNotes::Null => Ok(None),
        RawNotes::String(s) => Ok(Some(s.to_string())),
        RawNotes::Object(map) => map.get("comment").map_or(Ok(None), stringify_comment),
        RawNotes::Other(kind) => Err(DecodeError::UnexpectedNotes { kind }),
    }
}

// Scalar comments keep their JSON text form; containers are rejected.
fn stringify_comment(comment: &Value) -> Result<Option<String>, DecodeError> {
    match comment {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Bool(_) | Value::Number(_) => Ok(Some(comment.to_string())),
        Value::Array(_) | Value::Object(_) => Err(DecodeError::UnexpectedComment {
            kind: token_kind(comment),
        }),
    }
}

/// Serde adapter accepting every shape [`decode_notes`] accepts.
///
/// Use with `#[serde(default, deserialize_with = "notes::deserialize")]`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    decode_notes(value.as_ref()).map_err(serde::de::Error::custom)
}
