use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{QuedError, Result};

/// A queued item, as stored on both the live and the dead-letter list.
///
/// The JSON layout is shared with every other producer and consumer of the
/// same lists, so field names and omission rules are fixed:
///
/// ```json
/// {"id":"…","type":"order.created","payload":{"id":42},"created_at":"2024-05-01T12:00:00Z","attempts":1}
/// ```
///
/// `type` is left out when absent and `attempts` when zero.
///
/// # Examples
///
/// ```
/// use qued::Message;
/// use serde_json::json;
///
/// let message = Message::new(Some("user.created"), json!({"name": "Ferris"}));
/// assert_eq!(message.kind.as_deref(), Some("user.created"));
/// assert_eq!(message.attempts, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique identifier minted at enqueue time (UUID v4 text)
    pub id: String,
    /// Optional classification string
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Opaque application payload
    #[serde(default)]
    pub payload: Value,
    /// RFC 3339 UTC creation timestamp, kept verbatim
    pub created_at: String,
    /// Number of Retry/Fail calls this message has gone through
    #[serde(default, skip_serializing_if = "is_zero")]
    pub attempts: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl Message {
    /// Creates a fresh message with a new id, the current UTC time and zero
    /// attempts. An empty `kind` is treated as no kind.
    pub fn new(kind: Option<&str>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: kind.filter(|k| !k.is_empty()).map(str::to_string),
            payload,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            attempts: 0,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(QuedError::Serialization)
    }

    /// Decodes a stored record. On failure the raw bytes travel with the
    /// error so the caller can still persist them somewhere.
    pub fn decode(raw: Vec<u8>) -> Result<Self> {
        match serde_json::from_slice(&raw) {
            Ok(message) => Ok(message),
            Err(source) => Err(QuedError::Deserialization { source, raw }),
        }
    }

    /// Parses `created_at`. Returns `None` when a foreign producer wrote
    /// something that is not RFC 3339.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Deserializes the payload into a concrete type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.payload).map_err(QuedError::Serialization)
    }
}
