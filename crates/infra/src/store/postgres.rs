//! Postgres-backed stores.
//!
//! The traits are synchronous, so each adapter keeps a tokio runtime handle and
//! drives sqlx futures with `Handle::block_on`. Call these from plain threads
//! (or `spawn_blocking`), never from inside an async task.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (lock not available) | `55P03` | `LockTimeout` | `lock_timeout` elapsed in `lock_for_update` |
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate id or active last four |
//! | Database (other) | Any other | `Backend` | Constraint or server errors |
//! | PoolClosed / Io / Other | N/A | `Backend` | Connection failures |
//!
//! ## Locking
//!
//! `lock_for_update` opens a transaction and runs `SELECT … FOR UPDATE` on the
//! account row. The guard owns that transaction: `commit` writes the new
//! document and commits, dropping the guard rolls back and releases the row.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use tokio::runtime::Handle;
use tracing::instrument;
use uuid::Uuid;

use fintrack_accounts::{Account, AccountSnapshot};
use fintrack_core::{AccountId, ReconciliationId, SnapshotId, TransactionId, UserId};
use fintrack_transactions::{Reconciliation, ReconciliationStatus};

use super::{AccountGuard, AccountStore, ReconciliationStore, SnapshotStore};
use crate::error::StoreError;

const SCHEMA: &str = include_str!("../../migrations/0001_ledger.sql");

/// Apply the ledger schema (idempotent).
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("migrate", e))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
    handle: Handle,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self { pool, handle }
    }

    async fn lock_row(
        &self,
        id: AccountId,
        wait: Option<Duration>,
    ) -> Result<(sqlx::Transaction<'static, Postgres>, Account), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if let Some(wait) = wait {
            // SET does not take bind parameters; the value is an integer we format.
            sqlx::query(&format!(
                "SET LOCAL lock_timeout = '{}ms'",
                wait.as_millis().max(1)
            ))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;
        }

        let row = sqlx::query("SELECT document FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                if is_lock_not_available(&e) {
                    StoreError::LockTimeout(id)
                } else {
                    map_sqlx_error("lock_account", e)
                }
            })?;

        let row = row.ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
        let account = decode_account(&row)?;
        Ok((tx, account))
    }
}

/// Row lock held through an open Postgres transaction.
pub struct PostgresAccountGuard<'a> {
    /// `None` once committed.
    tx: Option<sqlx::Transaction<'static, Postgres>>,
    account: Account,
    handle: &'a Handle,
}

impl Drop for PostgresAccountGuard<'_> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            // Rolling back returns the connection to the pool, which spawns on the runtime.
            let _rt = self.handle.enter();
            drop(tx);
        }
    }
}

impl AccountGuard for PostgresAccountGuard<'_> {
    fn account(&self) -> &Account {
        &self.account
    }

    fn commit(mut self, account: Account) -> Result<(), StoreError> {
        if account.id_typed() != self.account.id_typed() {
            return Err(StoreError::Conflict(format!(
                "guard for account {} cannot commit account {}",
                self.account.id_typed(),
                account.id_typed()
            )));
        }

        let document =
            serde_json::to_value(&account).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let Some(mut tx) = self.tx.take() else {
            return Err(StoreError::Conflict(format!(
                "guard for account {} already committed",
                account.id_typed()
            )));
        };

        self.handle.block_on(async move {
            sqlx::query(
                r#"
                UPDATE accounts
                SET user_id = $2, account_type = $3, last_four = $4, active = $5,
                    document = $6, updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(*account.id_typed().as_uuid())
            .bind(account.user_id().map(|u| *u.as_uuid()))
            .bind(account.account_type().as_str())
            .bind(account.last_four())
            .bind(account.is_active())
            .bind(&document)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_account", e))?;

            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit", e))
        })
    }
}

impl AccountStore for PostgresAccountStore {
    type Guard<'a> = PostgresAccountGuard<'a>;

    #[instrument(skip(self), fields(account_id = %id), err)]
    fn lock_for_update(
        &self,
        id: AccountId,
        wait: Option<Duration>,
    ) -> Result<Self::Guard<'_>, StoreError> {
        let (tx, account) = self.handle.block_on(self.lock_row(id, wait))?;
        Ok(PostgresAccountGuard {
            tx: Some(tx),
            account,
            handle: &self.handle,
        })
    }

    fn find(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = self.handle.block_on(
            sqlx::query("SELECT document FROM accounts WHERE id = $1")
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool),
        );
        match row.map_err(|e| map_sqlx_error("find_account", e))? {
            Some(row) => Ok(Some(decode_account(&row)?)),
            None => Ok(None),
        }
    }

    fn insert(&self, account: Account) -> Result<(), StoreError> {
        let document =
            serde_json::to_value(&account).map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.handle
            .block_on(
                sqlx::query(
                    r#"
                    INSERT INTO accounts (id, user_id, account_type, last_four, active, document)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(*account.id_typed().as_uuid())
                .bind(account.user_id().map(|u| *u.as_uuid()))
                .bind(account.account_type().as_str())
                .bind(account.last_four())
                .bind(account.is_active())
                .bind(&document)
                .execute(&self.pool),
            )
            .map_err(|e| map_sqlx_error("insert_account", e))?;
        Ok(())
    }

    fn list_for_user(&self, user_id: Option<UserId>) -> Result<Vec<Account>, StoreError> {
        let rows = self
            .handle
            .block_on(
                sqlx::query(
                    "SELECT document FROM accounts WHERE user_id IS NOT DISTINCT FROM $1 ORDER BY id",
                )
                .bind(user_id.map(|u| *u.as_uuid()))
                .fetch_all(&self.pool),
            )
            .map_err(|e| map_sqlx_error("list_accounts", e))?;

        rows.iter().map(decode_account).collect()
    }
}

fn decode_account(row: &PgRow) -> Result<Account, StoreError> {
    let document: serde_json::Value = row
        .try_get("document")
        .map_err(|e| map_sqlx_error("decode_account", e))?;
    serde_json::from_value(document).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct PostgresSnapshotStore {
    pool: PgPool,
    handle: Handle,
}

impl PostgresSnapshotStore {
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self { pool, handle }
    }

    fn select(&self, column: &str, id: Uuid) -> Result<Vec<AccountSnapshot>, StoreError> {
        let sql = format!(
            r#"
            SELECT id, account_id, transaction_id, balance_before, balance_after,
                   transaction_amount, created_at
            FROM account_snapshots
            WHERE {column} = $1
            ORDER BY seq ASC
            "#
        );
        let rows = self
            .handle
            .block_on(sqlx::query(&sql).bind(id).fetch_all(&self.pool))
            .map_err(|e| map_sqlx_error("select_snapshots", e))?;

        rows.iter()
            .map(|row| snapshot_from_row(row).map_err(|e| map_sqlx_error("decode_snapshot", e)))
            .collect()
    }
}

impl SnapshotStore for PostgresSnapshotStore {
    fn append(&self, snapshot: &AccountSnapshot) -> Result<(), StoreError> {
        self.handle
            .block_on(
                sqlx::query(
                    r#"
                    INSERT INTO account_snapshots (
                        id, account_id, transaction_id, balance_before, balance_after,
                        transaction_amount, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(*snapshot.id.as_uuid())
                .bind(*snapshot.account_id.as_uuid())
                .bind(*snapshot.transaction_id.as_uuid())
                .bind(snapshot.balance_before)
                .bind(snapshot.balance_after)
                .bind(snapshot.transaction_amount)
                .bind(snapshot.created_at)
                .execute(&self.pool),
            )
            .map_err(|e| map_sqlx_error("append_snapshot", e))?;
        Ok(())
    }

    fn for_account(&self, account_id: AccountId) -> Result<Vec<AccountSnapshot>, StoreError> {
        self.select("account_id", *account_id.as_uuid())
    }

    fn for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<AccountSnapshot>, StoreError> {
        self.select("transaction_id", *transaction_id.as_uuid())
    }
}

fn snapshot_from_row(row: &PgRow) -> Result<AccountSnapshot, sqlx::Error> {
    Ok(AccountSnapshot {
        id: SnapshotId::from_uuid(row.try_get("id")?),
        account_id: AccountId::from_uuid(row.try_get("account_id")?),
        transaction_id: TransactionId::from_uuid(row.try_get("transaction_id")?),
        balance_before: row.try_get::<Decimal, _>("balance_before")?,
        balance_after: row.try_get::<Decimal, _>("balance_after")?,
        transaction_amount: row.try_get::<Decimal, _>("transaction_amount")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct PostgresReconciliationStore {
    pool: PgPool,
    handle: Handle,
}

impl PostgresReconciliationStore {
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self { pool, handle }
    }
}

const RECONCILIATION_COLUMNS: &str = "id, original_txn_id, reversal_txn_id, updated_txn_id, \
     status, remarks, started_at, completed_at, created_at";

impl ReconciliationStore for PostgresReconciliationStore {
    fn append(&self, rec: &Reconciliation) -> Result<(), StoreError> {
        self.handle
            .block_on(
                sqlx::query(
                    r#"
                    INSERT INTO reconciliations (
                        id, original_txn_id, reversal_txn_id, updated_txn_id,
                        status, remarks, started_at, completed_at, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(*rec.id.as_uuid())
                .bind(*rec.original_txn_id.as_uuid())
                .bind(*rec.reversal_txn_id.as_uuid())
                .bind(rec.updated_txn_id.map(|id| *id.as_uuid()))
                .bind(status_str(rec.status))
                .bind(rec.remarks.as_deref())
                .bind(rec.started_at)
                .bind(rec.completed_at)
                .bind(rec.created_at)
                .execute(&self.pool),
            )
            .map_err(|e| map_sqlx_error("append_reconciliation", e))?;
        Ok(())
    }

    fn find(&self, id: ReconciliationId) -> Result<Option<Reconciliation>, StoreError> {
        let sql = format!("SELECT {RECONCILIATION_COLUMNS} FROM reconciliations WHERE id = $1");
        let row = self
            .handle
            .block_on(sqlx::query(&sql).bind(*id.as_uuid()).fetch_optional(&self.pool))
            .map_err(|e| map_sqlx_error("find_reconciliation", e))?;

        row.as_ref().map(reconciliation_from_row).transpose()
    }

    fn update_status(&self, rec: &Reconciliation) -> Result<(), StoreError> {
        let result = self
            .handle
            .block_on(
                sqlx::query(
                    "UPDATE reconciliations SET status = $2, remarks = $3, completed_at = $4 WHERE id = $1",
                )
                .bind(*rec.id.as_uuid())
                .bind(status_str(rec.status))
                .bind(rec.remarks.as_deref())
                .bind(rec.completed_at)
                .execute(&self.pool),
            )
            .map_err(|e| map_sqlx_error("update_reconciliation", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("reconciliation {}", rec.id)));
        }
        Ok(())
    }

    fn for_original(
        &self,
        original_txn_id: TransactionId,
    ) -> Result<Vec<Reconciliation>, StoreError> {
        let sql = format!(
            "SELECT {RECONCILIATION_COLUMNS} FROM reconciliations WHERE original_txn_id = $1 ORDER BY seq ASC"
        );
        let rows = self
            .handle
            .block_on(
                sqlx::query(&sql)
                    .bind(*original_txn_id.as_uuid())
                    .fetch_all(&self.pool),
            )
            .map_err(|e| map_sqlx_error("select_reconciliations", e))?;

        rows.iter().map(reconciliation_from_row).collect()
    }
}

fn status_str(status: ReconciliationStatus) -> &'static str {
    match status {
        ReconciliationStatus::Pending => "PENDING",
        ReconciliationStatus::Completed => "COMPLETED",
    }
}

fn reconciliation_from_row(row: &PgRow) -> Result<Reconciliation, StoreError> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode_reconciliation", e);

    let status: String = row.try_get("status").map_err(decode)?;
    let status = match status.as_str() {
        "PENDING" => ReconciliationStatus::Pending,
        "COMPLETED" => ReconciliationStatus::Completed,
        other => {
            return Err(StoreError::Serialization(format!(
                "unknown reconciliation status '{other}'"
            )));
        }
    };
    let updated: Option<Uuid> = row.try_get("updated_txn_id").map_err(decode)?;

    Ok(Reconciliation {
        id: ReconciliationId::from_uuid(row.try_get("id").map_err(decode)?),
        original_txn_id: TransactionId::from_uuid(row.try_get("original_txn_id").map_err(decode)?),
        reversal_txn_id: TransactionId::from_uuid(row.try_get("reversal_txn_id").map_err(decode)?),
        updated_txn_id: updated.map(TransactionId::from_uuid),
        status,
        remarks: row.try_get("remarks").map_err(decode)?,
        started_at: row.try_get("started_at").map_err(decode)?,
        completed_at: row.try_get("completed_at").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

/// `lock_timeout` elapsed while waiting for a row lock.
fn is_lock_not_available(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "55P03";
        }
    }
    false
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
            let msg = format!(
                "database error in {operation} ({code}): {}",
                db_err.message()
            );
            match code.as_str() {
                "23505" => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(format!("decode error in {operation}: {err}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
