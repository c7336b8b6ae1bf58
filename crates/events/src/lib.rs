//! Domain events and the after-commit publication boundary.
//!
//! Balance and correction side effects (audit snapshots, reconciliation rows) are
//! published here only after the mutation that caused them has committed, and are
//! consumed off the caller's critical path.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::{EnvelopeError, EventEnvelope};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
