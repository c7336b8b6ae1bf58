//! Wiring: stores, ledger, correction engine, recorders and the audit worker.
//!
//! Two profiles, chosen by [`LedgerConfig::use_persistent_stores`]:
//! - **in-memory**: every store in process (tests, single-process use)
//! - **postgres**: accounts, snapshots and reconciliations in Postgres; the
//!   transaction journal stays in process

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::info;

use fintrack_events::InMemoryEventBus;

use crate::account_manager::AccountManager;
use crate::audit::{AuditMessage, ReconciliationRecorder, SnapshotRecorder};
use crate::config::{ConfigError, LedgerConfig};
use crate::correction::CorrectionEngine;
use crate::error::StoreError;
use crate::ledger::BalanceLedger;
use crate::store::postgres::migrate;
use crate::store::{
    AccountStore, InMemoryAccountStore, InMemoryReconciliationStore, InMemorySnapshotStore,
    InMemoryTransactionJournal, PostgresAccountStore, PostgresReconciliationStore,
    PostgresSnapshotStore, ReconciliationStore, SnapshotStore, TransactionJournal,
};
use crate::workers::{AuditRouter, AuditWorker, WorkerHandle};

pub type AuditBus = Arc<InMemoryEventBus<AuditMessage>>;

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to start the audit worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Everything a caller needs, sharing one account store and one audit bus.
pub struct LedgerServices<S, J, N, R> {
    pub accounts: AccountManager<Arc<S>>,
    pub engine: CorrectionEngine<Arc<S>, Arc<J>, AuditBus>,
    pub snapshots: SnapshotRecorder<Arc<N>>,
    pub reconciliations: ReconciliationRecorder<Arc<R>>,
    worker: WorkerHandle,
}

pub type InMemoryServices = LedgerServices<
    InMemoryAccountStore,
    InMemoryTransactionJournal,
    InMemorySnapshotStore,
    InMemoryReconciliationStore,
>;

pub type PostgresServices = LedgerServices<
    PostgresAccountStore,
    InMemoryTransactionJournal,
    PostgresSnapshotStore,
    PostgresReconciliationStore,
>;

impl<S, J, N, R> LedgerServices<S, J, N, R>
where
    S: AccountStore,
    J: TransactionJournal,
    N: SnapshotStore + 'static,
    R: ReconciliationStore + 'static,
{
    /// Assemble the services around the given stores and start the audit worker.
    pub fn assemble(
        config: &LedgerConfig,
        accounts: S,
        journal: J,
        snapshots: N,
        reconciliations: R,
    ) -> Result<Self, ServicesError> {
        let accounts = Arc::new(accounts);
        let snapshots = SnapshotRecorder::new(Arc::new(snapshots));
        let reconciliations = ReconciliationRecorder::new(Arc::new(reconciliations));
        let bus: AuditBus = Arc::new(InMemoryEventBus::new());

        let router = AuditRouter::new(snapshots.clone(), reconciliations.clone());
        let worker = AuditWorker::spawn(&bus, router, config.audit_retry.clone())?;

        let ledger = BalanceLedger::new(Arc::clone(&accounts), bus)
            .with_lock_timeout(config.lock_timeout);

        Ok(Self {
            accounts: AccountManager::new(accounts).with_lock_timeout(config.lock_timeout),
            engine: CorrectionEngine::new(ledger, Arc::new(journal)),
            snapshots,
            reconciliations,
            worker,
        })
    }

    pub fn ledger(&self) -> &BalanceLedger<Arc<S>, AuditBus> {
        self.engine.ledger()
    }

    /// Stop the audit worker after it has recorded everything already published.
    pub fn shutdown(self) {
        self.worker.shutdown();
    }
}

impl InMemoryServices {
    pub fn in_memory(config: &LedgerConfig) -> Result<Self, ServicesError> {
        Self::assemble(
            config,
            InMemoryAccountStore::new(),
            InMemoryTransactionJournal::new(),
            InMemorySnapshotStore::new(),
            InMemoryReconciliationStore::new(),
        )
    }
}

impl PostgresServices {
    /// Connect, apply the schema and assemble. Must not be called from inside an
    /// async task; `handle` drives every query.
    pub fn postgres(config: &LedgerConfig, handle: Handle) -> Result<Self, ServicesError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseUrl)?;

        let pool = handle.block_on(async {
            let pool = PgPool::connect(url)
                .await
                .map_err(|e| StoreError::Backend(format!("connect: {e}")))?;
            migrate(&pool).await?;
            Ok::<_, StoreError>(pool)
        })?;
        info!("connected to postgres, schema applied");

        Self::assemble(
            config,
            PostgresAccountStore::new(pool.clone(), handle.clone()),
            InMemoryTransactionJournal::new(),
            PostgresSnapshotStore::new(pool.clone(), handle.clone()),
            PostgresReconciliationStore::new(pool, handle),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::new_txn;
    use fintrack_accounts::{AccountType, NewAccount};
    use fintrack_transactions::TransactionType;
    use rust_decimal_macros::dec;

    #[test]
    fn in_memory_profile_records_snapshots_through_the_worker() {
        let services = InMemoryServices::in_memory(&LedgerConfig::default()).unwrap();
        let account = services
            .accounts
            .open_account(NewAccount {
                name: "Wallet".into(),
                account_type: Some(AccountType::Cash),
                last_four: "0000".into(),
                currency: "EUR".into(),
                starting_balance: Some(dec!(20)),
                ..NewAccount::default()
            })
            .unwrap();

        let txn = services
            .engine
            .create(new_txn(account.id_typed(), dec!(5), TransactionType::Expense))
            .unwrap();

        let snapshots = services.snapshots.clone();
        services.shutdown();

        let rows = snapshots.for_transaction(txn.id_typed()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].balance_before, dec!(20));
        assert_eq!(rows[0].balance_after, dec!(15));
    }

    #[test]
    fn postgres_profile_requires_a_url() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        let err = PostgresServices::postgres(&LedgerConfig::default(), runtime.handle().clone())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ServicesError::Config(ConfigError::MissingDatabaseUrl)
        ));
    }
}
