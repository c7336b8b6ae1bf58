//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus is the transport between a committed balance mutation (or a committed
//! correction) and the audit recorders that append snapshot and reconciliation
//! rows. It is deliberately thin:
//!
//! - **After-commit only**: producers publish once their write is durable, so a
//!   rejected mutation never reaches a subscriber.
//! - **At-least-once**: a message may be seen more than once by a recorder that
//!   retries; recorders append, so duplicates show up as duplicate audit rows
//!   rather than corrupted balances.
//! - **No persistence**: a crash between commit and publication loses the audit
//!   message. Balances stay correct; the audit trail has a gap.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of every message published after it was
/// created (broadcast semantics). Intended for a single consuming thread:
///
/// ```ignore
/// let subscription = bus.subscribe();
/// loop {
///     match subscription.recv_timeout(Duration::from_millis(250)) {
///         Ok(envelope) => recorder.handle(envelope),
///         Err(RecvTimeoutError::Timeout) => continue,      // check for shutdown
///         Err(RecvTimeoutError::Disconnected) => break,     // bus dropped
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Transport-agnostic pub/sub bus.
///
/// ```text
/// BalanceLedger ── commit ──▶ publish(BalanceChanged) ──▶ audit worker ──▶ SnapshotRecorder
/// CorrectionEngine ─ commit ─▶ publish(ReconciliationRequested) ──▶ ReconciliationRecorder
/// ```
///
/// `publish()` may fail (poisoned lock, broker down). Producers treat that as a
/// logged audit gap: the write it describes has already committed and must not
/// be undone because of it.
///
/// Implementations must be `Send + Sync`; ledger calls on different accounts
/// publish concurrently.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
