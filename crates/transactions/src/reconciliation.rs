use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fintrack_core::{DomainError, Entity, ReconciliationId, TransactionId};
use fintrack_events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationStatus {
    Pending,
    Completed,
}

/// Audit record linking an original row to its reversal (and replacement, for edits).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub id: ReconciliationId,
    pub original_txn_id: TransactionId,
    pub reversal_txn_id: TransactionId,
    pub updated_txn_id: Option<TransactionId>,
    pub status: ReconciliationStatus,
    pub remarks: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Reconciliation {
    pub fn pending(request: &ReconciliationRequested, now: DateTime<Utc>) -> Self {
        Self {
            id: ReconciliationId::new(),
            original_txn_id: request.original_txn_id,
            reversal_txn_id: request.reversal_txn_id,
            updated_txn_id: request.updated_txn_id,
            status: ReconciliationStatus::Pending,
            remarks: request.remarks.clone(),
            started_at: Some(request.requested_at),
            completed_at: None,
            created_at: now,
        }
    }

    pub fn complete(&mut self, remarks: Option<String>, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status == ReconciliationStatus::Completed {
            return Err(DomainError::invalid_operation(format!(
                "reconciliation {} already completed",
                self.id
            )));
        }
        self.status = ReconciliationStatus::Completed;
        self.completed_at = Some(now);
        if remarks.is_some() {
            self.remarks = remarks;
        }
        Ok(())
    }
}

impl Entity for Reconciliation {
    type Id = ReconciliationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Published after a correction commits; the reconciliation recorder turns it
/// into a `Reconciliation` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRequested {
    pub original_txn_id: TransactionId,
    pub reversal_txn_id: TransactionId,
    pub updated_txn_id: Option<TransactionId>,
    pub remarks: Option<String>,
    pub requested_at: DateTime<Utc>,
}

impl ReconciliationRequested {
    pub const EVENT_TYPE: &'static str = "transactions.reconciliation_requested";
}

impl Event for ReconciliationRequested {
    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.requested_at
    }
}
