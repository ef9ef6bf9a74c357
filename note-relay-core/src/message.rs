//! Relayed message model

use crate::error::DecodeError;
use crate::notes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Which producer a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Published through this process's own API
    Local,
    /// Received from the peer over the bus
    Remote,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Local => "local",
            Origin::Remote => "remote",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Origin::Local),
            "remote" => Ok(Origin::Remote),
            other => Err(format!("unknown origin: {} (expected local or remote)", other)),
        }
    }
}

/// One relayed note
///
/// Serializes in canonical form: `notes` is a plain string or omitted,
/// never the structured `{"comment": ...}` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque identifier; uniqueness is not enforced
    pub id: String,
    /// Message body
    pub payload: String,
    /// Free-text comment, if any
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "notes::deserialize"
    )]
    pub notes: Option<String>,
    /// Creation time, set by the producer
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message with a generated id and the current time
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload: payload.into(),
            notes: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach a note
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Build a message from a raw envelope.
    ///
    /// `payload` is required. A missing `id` is generated for local
    /// publishes but rejected for remote envelopes, since a peer always
    /// stamps its own ids. A missing `timestamp` defaults to now.
    pub fn from_envelope(envelope: &Value, origin: Origin) -> Result<Self, DecodeError> {
        let Value::Object(fields) = envelope else {
            return Err(DecodeError::InvalidEnvelope(format!(
                "expected object, found {}",
                notes::token_kind(envelope)
            )));
        };

        let id = match fields.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            None | Some(Value::Null) if origin == Origin::Local => {
                uuid::Uuid::new_v4().to_string()
            }
            None | Some(Value::Null) => {
                return Err(DecodeError::InvalidEnvelope("missing id".to_string()))
            }
            Some(other) => {
                return Err(DecodeError::InvalidEnvelope(format!(
                    "id must be a non-empty string or number, found {}",
                    notes::token_kind(other)
                )))
            }
        };

        let payload = match fields.get("payload") {
            Some(Value::String(s)) => s.clone(),
            None | Some(Value::Null) => {
                return Err(DecodeError::InvalidEnvelope("missing payload".to_string()))
            }
            Some(other) => {
                return Err(DecodeError::InvalidEnvelope(format!(
                    "payload must be a string, found {}",
                    notes::token_kind(other)
                )))
            }
        };

        let timestamp = match fields.get("timestamp") {
            None | Some(Value::Null) => Utc::now(),
            Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| {
                    DecodeError::InvalidEnvelope(format!("invalid timestamp {:?}: {}", raw, e))
                })?,
            Some(other) => {
                return Err(DecodeError::InvalidEnvelope(format!(
                    "timestamp must be an RFC 3339 string, found {}",
                    notes::token_kind(other)
                )))
            }
        };

        let notes = notes::decode_notes(fields.get("notes"))?;

        Ok(Self {
            id,
            payload,
            notes,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_envelope_full() {
        let envelope = json!({
            "id": "m-1",
            "payload": "hello",
            "notes": {"comment": "structured"},
            "timestamp": "2026-10-16T08:30:00Z"
        });
        let msg = Message::from_envelope(&envelope, Origin::Remote).unwrap();

        assert_eq!(msg.id, "m-1");
        assert_eq!(msg.payload, "hello");
        assert_eq!(msg.notes.as_deref(), Some("structured"));
        assert_eq!(msg.timestamp.to_rfc3339(), "2026-10-16T08:30:00+00:00");
    }

    #[test]
    fn test_numeric_id_is_stringified() {
        let msg = Message::from_envelope(&json!({"id": 999, "payload": "x"}), Origin::Remote)
            .unwrap();
        assert_eq!(msg.id, "999");
    }

    #[test]
    fn test_missing_id_generated_for_local_only() {
        let envelope = json!({"payload": "x"});
        let local = Message::from_envelope(&envelope, Origin::Local).unwrap();
        assert!(uuid::Uuid::parse_str(&local.id).is_ok());

        let err = Message::from_envelope(&envelope, Origin::Remote).unwrap_err();
        assert_eq!(err, DecodeError::InvalidEnvelope("missing id".to_string()));
    }

    #[test]
    fn test_rejects_malformed_envelopes() {
        assert!(Message::from_envelope(&json!([1]), Origin::Local).is_err());
        assert!(Message::from_envelope(&json!({"id": "a"}), Origin::Local).is_err());
        assert!(Message::from_envelope(&json!({"id": "a", "payload": 3}), Origin::Local).is_err());
        assert!(Message::from_envelope(&json!({"id": true, "payload": "p"}), Origin::Local).is_err());
        assert!(Message::from_envelope(
            &json!({"id": "a", "payload": "p", "timestamp": "yesterday"}),
            Origin::Local
        )
        .is_err());
    }

    #[test]
    fn test_bad_notes_fail_whole_message() {
        let err = Message::from_envelope(
            &json!({"id": "a", "payload": "p", "notes": 42}),
            Origin::Local,
        )
        .unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedNotes { kind: "number" });
    }

    #[test]
    fn test_canonical_serialization() {
        let with_note = Message::new("p").with_id("a").with_notes("n");
        let value = serde_json::to_value(&with_note).unwrap();
        assert_eq!(value["notes"], json!("n"));

        let without = Message::new("p").with_id("b");
        let value = serde_json::to_value(&without).unwrap();
        assert!(value.get("notes").is_none());
    }

    #[test]
    fn test_deserialize_accepts_structured_notes() {
        let msg: Message = serde_json::from_value(json!({
            "id": "a",
            "payload": "p",
            "notes": {"comment": "c"},
            "timestamp": "2026-10-16T08:30:00Z"
        }))
        .unwrap();
        assert_eq!(msg.notes.as_deref(), Some("c"));
    }

    #[test]
    fn test_origin_parse() {
        assert_eq!("local".parse::<Origin>().unwrap(), Origin::Local);
        assert_eq!("REMOTE".parse::<Origin>().unwrap(), Origin::Remote);
        assert!("peer".parse::<Origin>().is_err());
    }
}
