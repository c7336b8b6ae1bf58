//! After-commit audit trail.
//!
//! The ledger and the correction engine publish typed events through the
//! [`AuditOutbox`] once their writes are durable. The audit worker routes them to
//! the recorders, which append snapshot and reconciliation rows.

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::error;
use uuid::Uuid;

use fintrack_events::{Event, EventBus, EventEnvelope, Subscription};

pub mod recorders;

pub use recorders::{ReconciliationRecorder, SnapshotRecorder};

/// Unit carried on the audit bus.
pub type AuditMessage = EventEnvelope<JsonValue>;

/// Publishing side of the audit bus.
#[derive(Debug, Clone)]
pub struct AuditOutbox<B> {
    bus: B,
}

impl<B> AuditOutbox<B>
where
    B: EventBus<AuditMessage>,
{
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Publish `event` about `stream_id`.
    ///
    /// The write it describes has already committed, so failures are logged as an
    /// audit gap and reported as `false`; they are never propagated.
    pub fn publish<E>(&self, stream_id: Uuid, event: &E) -> bool
    where
        E: Event + Serialize,
    {
        let envelope = match EventEnvelope::from_typed(stream_id, event) {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(event_type = event.event_type(), %stream_id, error = %err, "audit event could not be encoded");
                return false;
            }
        };

        match self.bus.publish(envelope) {
            Ok(()) => true,
            Err(err) => {
                error!(event_type = event.event_type(), %stream_id, error = ?err, "audit event publication failed");
                false
            }
        }
    }

    pub fn subscribe(&self) -> Subscription<AuditMessage> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}
