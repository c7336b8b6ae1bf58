use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use crate::Event;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("payload serialization failed: {0}")]
    Serialize(String),

    #[error("payload of '{event_type}' could not be decoded: {reason}")]
    Deserialize { event_type: String, reason: String },
}

/// Envelope for an event, carrying routing metadata next to the payload.
///
/// This is the unit published on the bus after a commit.
///
/// Notes:
/// - `stream_id` is the entity the event is about (an account for balance
///   changes, the original transaction for corrections).
/// - `event_type` + `event_version` let consumers decode `payload` without
///   knowing the producer's Rust type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    stream_id: Uuid,
    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        stream_id: Uuid,
        event_type: impl Into<String>,
        event_version: u32,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            stream_id,
            event_type: event_type.into(),
            event_version,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl EventEnvelope<JsonValue> {
    /// Wrap a typed event as a JSON envelope, capturing the metadata needed to
    /// decode it on the consumer side.
    pub fn from_typed<E>(stream_id: Uuid, event: &E) -> Result<Self, EnvelopeError>
    where
        E: Event + Serialize,
    {
        let payload =
            serde_json::to_value(event).map_err(|e| EnvelopeError::Serialize(e.to_string()))?;

        Ok(Self::new(
            Uuid::now_v7(),
            stream_id,
            event.event_type(),
            event.version(),
            event.occurred_at(),
            payload,
        ))
    }

    /// Decode the payload into a typed event.
    pub fn decode<E>(&self) -> Result<E, EnvelopeError>
    where
        E: DeserializeOwned,
    {
        serde_json::from_value(self.payload.clone()).map_err(|e| EnvelopeError::Deserialize {
            event_type: self.event_type.clone(),
            reason: e.to_string(),
        })
    }
}
