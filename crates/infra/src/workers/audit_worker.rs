use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, warn};

use fintrack_accounts::BalanceChanged;
use fintrack_events::{EnvelopeError, EventBus, Subscription};
use fintrack_transactions::ReconciliationRequested;

use super::retry::RetryPolicy;
use crate::audit::{AuditMessage, ReconciliationRecorder, SnapshotRecorder};
use crate::error::StoreError;
use crate::store::{ReconciliationStore, SnapshotStore};

#[derive(Debug, Error)]
pub enum AuditError {
    /// Payload does not match its event type. Never retried.
    #[error(transparent)]
    Decode(#[from] EnvelopeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuditError {
    fn is_retryable(&self) -> bool {
        !matches!(self, AuditError::Decode(_) | AuditError::Store(StoreError::Serialization(_)))
    }
}

/// Routes audit messages to the recorder that owns their event type.
#[derive(Debug, Clone)]
pub struct AuditRouter<S, R> {
    snapshots: SnapshotRecorder<S>,
    reconciliations: ReconciliationRecorder<R>,
}

impl<S, R> AuditRouter<S, R>
where
    S: SnapshotStore,
    R: ReconciliationStore,
{
    pub fn new(snapshots: SnapshotRecorder<S>, reconciliations: ReconciliationRecorder<R>) -> Self {
        Self {
            snapshots,
            reconciliations,
        }
    }

    /// Record one message. Unknown event types are skipped.
    pub fn handle(&self, message: &AuditMessage) -> Result<(), AuditError> {
        match message.event_type() {
            BalanceChanged::EVENT_TYPE => {
                let change: BalanceChanged = message.decode()?;
                self.snapshots.record_change(&change)?;
            }
            ReconciliationRequested::EVENT_TYPE => {
                let request: ReconciliationRequested = message.decode()?;
                self.reconciliations.record(&request)?;
            }
            other => debug!(event_type = other, "audit message ignored"),
        }
        Ok(())
    }
}

/// Handle to control and join the audit worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Stop after draining messages already delivered, then wait for the thread.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Background thread applying audit messages with retries.
///
/// Recording failures never reach the producer: they are retried under the
/// policy and logged at `error` when retries run out.
#[derive(Debug)]
pub struct AuditWorker;

impl AuditWorker {
    /// Subscribe to `bus` now and spawn the worker thread.
    ///
    /// Messages published before this call are not seen.
    pub fn spawn<B, S, R>(
        bus: &B,
        router: AuditRouter<S, R>,
        retry: RetryPolicy,
    ) -> std::io::Result<WorkerHandle>
    where
        B: EventBus<AuditMessage>,
        S: SnapshotStore + 'static,
        R: ReconciliationStore + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub = bus.subscribe();

        let join = thread::Builder::new()
            .name("audit-worker".to_string())
            .spawn(move || worker_loop(sub, shutdown_rx, &router, &retry))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<S, R>(
    sub: Subscription<AuditMessage>,
    shutdown_rx: mpsc::Receiver<()>,
    router: &AuditRouter<S, R>,
    retry: &RetryPolicy,
) where
    S: SnapshotStore,
    R: ReconciliationStore,
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            // Drain what was already delivered so no committed change goes unaudited.
            loop {
                match sub.try_recv() {
                    Ok(msg) => process(router, retry, &msg),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
                }
            }
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => process(router, retry, &msg),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn process<S, R>(router: &AuditRouter<S, R>, retry: &RetryPolicy, msg: &AuditMessage)
where
    S: SnapshotStore,
    R: ReconciliationStore,
{
    let result = retry.run(
        || router.handle(msg),
        AuditError::is_retryable,
        |attempt, err| {
            warn!(
                event_type = msg.event_type(),
                event_id = %msg.event_id(),
                attempt,
                error = %err,
                "audit recording failed, retrying"
            )
        },
    );

    if let Err(err) = result {
        error!(
            event_type = msg.event_type(),
            event_id = %msg.event_id(),
            stream_id = %msg.stream_id(),
            error = %err,
            "audit record lost"
        );
    }
}
