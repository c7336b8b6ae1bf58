//! Correction engine: posting, deleting and editing journal rows.
//!
//! Stored financial values are never edited. A delete posts a reversal; a
//! structural edit posts a reversal and a replacement. Each balance effect goes
//! through [`BalanceLedger`] as its own locked mutation.
//!
//! Every posting is journalled first: the new row and the status flips it
//! implies are written in one batch, then the ledger applies the effect. A
//! rejected effect puts the journal back as it was. A row therefore reads as
//! deleted or replaced exactly when its reversal has been written, so a
//! replayed delete finds `last_action` already set and does nothing.
//!
//! Corrections of one row are serialized by a per-transaction claim held from
//! the first read until the last write.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use fintrack_core::{DomainError, TransactionId};
use fintrack_events::EventBus;
use fintrack_transactions::{
    ChangeKind, NewTransaction, ReconciliationRequested, Transaction, TransactionStatus,
    UpdateTransactionRequest,
};

use crate::audit::AuditMessage;
use crate::error::{LedgerError, StoreError};
use crate::ledger::BalanceLedger;
use crate::store::{AccountStore, TransactionJournal};

/// Result of [`CorrectionEngine::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Posted row cancelled by the given reversal.
    Deleted { reversal_id: TransactionId },
    /// Draft dropped; it never had a balance effect.
    DiscardedDraft,
    /// Row was deleted before; nothing happened.
    AlreadyDeleted,
}

/// Transaction ids currently being corrected.
#[derive(Debug, Default)]
struct TransactionClaims {
    held: Mutex<HashSet<TransactionId>>,
    released: Condvar,
}

impl TransactionClaims {
    fn claim(&self, id: TransactionId) -> Result<Claim<'_>, StoreError> {
        let held = self.held.lock().map_err(|_| StoreError::Poisoned)?;
        let mut held = self
            .released
            .wait_while(held, |held| held.contains(&id))
            .map_err(|_| StoreError::Poisoned)?;
        held.insert(id);
        Ok(Claim { claims: self, id })
    }
}

struct Claim<'a> {
    claims: &'a TransactionClaims,
    id: TransactionId,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut held = self
            .claims
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.id);
        drop(held);
        self.claims.released.notify_all();
    }
}

#[derive(Debug, Clone)]
pub struct CorrectionEngine<S, J, B> {
    ledger: BalanceLedger<S, B>,
    journal: J,
    claims: Arc<TransactionClaims>,
}

impl<S, J, B> CorrectionEngine<S, J, B>
where
    S: AccountStore,
    J: TransactionJournal,
    B: EventBus<AuditMessage>,
{
    pub fn new(ledger: BalanceLedger<S, B>, journal: J) -> Self {
        Self {
            ledger,
            journal,
            claims: Arc::new(TransactionClaims::default()),
        }
    }

    pub fn ledger(&self) -> &BalanceLedger<S, B> {
        &self.ledger
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    pub fn find(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        Ok(self.journal.find_by_id(id)?)
    }

    /// Reversal rows that point back at `original`.
    pub fn reversals_of(&self, original: TransactionId) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.journal.find_reversals_of(original)?)
    }

    /// Post a new row. A rejected effect leaves no row behind.
    #[instrument(skip(self, input), fields(account_id = %input.account, kind = %input.kind))]
    pub fn create(&self, input: NewTransaction) -> Result<Transaction, LedgerError> {
        let txn = Transaction::new(input, Utc::now())?;
        self.post_journalled(std::slice::from_ref(&txn), &txn, &[])?;
        info!(transaction_id = %txn.id_typed(), "transaction created");
        Ok(txn)
    }

    /// Store an unposted row. No balance changes until it is confirmed.
    pub fn create_draft(&self, input: NewTransaction) -> Result<Transaction, LedgerError> {
        let txn = Transaction::draft(input, Utc::now())?;
        self.journal.save(&txn)?;
        Ok(txn)
    }

    /// `Draft → Active`, posting the row's effect.
    #[instrument(skip(self))]
    pub fn confirm_draft(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        let _claim = self.claims.claim(id)?;
        let draft = self.load(id)?;
        let mut txn = draft.clone();
        txn.confirm(Utc::now())?;
        self.post_journalled(std::slice::from_ref(&txn), &txn, std::slice::from_ref(&draft))?;
        info!("draft confirmed");
        Ok(txn)
    }

    /// Cancel a row's effect with a reversal.
    ///
    /// Deleting an already deleted row succeeds without doing anything. Reversal
    /// rows and replaced rows cannot be deleted.
    #[instrument(skip(self))]
    pub fn delete(&self, id: TransactionId) -> Result<DeleteOutcome, LedgerError> {
        let _claim = self.claims.claim(id)?;
        let original = self.load(id)?;
        let now = Utc::now();

        if original.is_deleted() {
            warn!(last_action = ?original.last_action(), "transaction already deleted");
            return Ok(DeleteOutcome::AlreadyDeleted);
        }
        original.ensure_correctable()?;

        if original.status() == TransactionStatus::Draft {
            let mut discarded = original;
            discarded.mark_deleted(now);
            self.journal.save(&discarded)?;
            info!("draft discarded");
            return Ok(DeleteOutcome::DiscardedDraft);
        }

        let reversal = original.build_reversal(now);
        let mut deleted = original.clone();
        deleted.mark_partially_deleted(now);
        self.post_journalled(
            &[deleted.clone(), reversal.clone()],
            &reversal,
            std::slice::from_ref(&original),
        )?;
        self.request_reconciliation(&deleted, &reversal, None, None);

        info!(reversal_id = %reversal.id_typed(), "transaction deleted");
        Ok(DeleteOutcome::Deleted {
            reversal_id: reversal.id_typed(),
        })
    }

    /// Edit a row.
    ///
    /// Descriptive edits (and any edit of a draft) merge in place. A change of
    /// amount, type or account reverses the original and posts a replacement,
    /// which is returned.
    ///
    /// If the ledger rejects the replacement after the reversal committed, the
    /// original values are posted again under a fresh id, the correction is
    /// recorded with remarks, and the ledger's error is returned.
    #[instrument(skip(self, request))]
    pub fn update(
        &self,
        id: TransactionId,
        request: UpdateTransactionRequest,
    ) -> Result<Transaction, LedgerError> {
        let _claim = self.claims.claim(id)?;
        let original = self.load(id)?;
        original.ensure_correctable()?;
        if request.amount.is_some_and(|a| a.is_zero()) {
            return Err(DomainError::validation("transaction amount must be positive").into());
        }

        let now = Utc::now();
        if original.classify(&request) == ChangeKind::InPlace {
            let mut edited = original;
            edited.apply_in_place(&request, now);
            self.journal.save(&edited)?;
            info!("transaction updated in place");
            return Ok(edited);
        }

        let reversal = original.build_reversal(now);
        let mut deleted = original.clone();
        deleted.mark_partially_deleted(now);
        self.post_journalled(
            &[deleted.clone(), reversal.clone()],
            &reversal,
            std::slice::from_ref(&original),
        )?;

        let replacement = original.build_replacement(&request, now);
        let mut replaced = original.clone();
        replaced.mark_replaced(now);

        match self.post_journalled(
            &[replaced.clone(), replacement.clone()],
            &replacement,
            std::slice::from_ref(&deleted),
        ) {
            Ok(()) => {
                self.request_reconciliation(&replaced, &reversal, Some(&replacement), None);
                info!(
                    reversal_id = %reversal.id_typed(),
                    replacement_id = %replacement.id_typed(),
                    "transaction replaced"
                );
                Ok(replacement)
            }
            Err(rejected) => {
                warn!(error = %rejected, "replacement rejected, re-posting original values");
                self.restore_original(&original, &deleted, &reversal, &rejected, now);
                Err(rejected)
            }
        }
    }

    /// Put the original effect back under a fresh id after its replacement was
    /// refused. If that is refused too, the original stays deleted.
    fn restore_original(
        &self,
        original: &Transaction,
        deleted: &Transaction,
        reversal: &Transaction,
        rejected: &LedgerError,
        now: DateTime<Utc>,
    ) {
        let repost = original.build_repost(now);
        let mut replaced = original.clone();
        replaced.mark_replaced(now);

        match self.post_journalled(
            &[replaced.clone(), repost.clone()],
            &repost,
            std::slice::from_ref(deleted),
        ) {
            Ok(()) => {
                let remarks = format!("replacement rejected ({rejected}); original values re-posted");
                self.request_reconciliation(&replaced, reversal, Some(&repost), Some(remarks));
            }
            Err(err) => {
                error!(error = %err, "re-posting original values failed");
                let remarks =
                    format!("replacement rejected ({rejected}); re-post rejected ({err})");
                self.request_reconciliation(deleted, reversal, None, Some(remarks));
            }
        }
    }

    fn load(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.journal
            .find_by_id(id)?
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    /// Journal `rows` (which include `effect`), then post `effect`.
    ///
    /// If the ledger refuses, `restore` is written back and every other row of
    /// the batch is dropped again.
    fn post_journalled(
        &self,
        rows: &[Transaction],
        effect: &Transaction,
        restore: &[Transaction],
    ) -> Result<(), LedgerError> {
        self.journal.save_all(rows)?;

        let Err(refused) = self.ledger.post(effect) else {
            return Ok(());
        };

        let discard: Vec<TransactionId> = rows
            .iter()
            .map(Transaction::id_typed)
            .filter(|id| !restore.iter().any(|r| r.id_typed() == *id))
            .collect();
        if let Err(err) = self.journal.write_batch(restore, &discard) {
            // The journal now claims an effect the balance never received.
            error!(
                error = %err,
                transaction_id = %effect.id_typed(),
                "journal rollback failed after a refused posting"
            );
        }
        Err(refused)
    }

    fn request_reconciliation(
        &self,
        original: &Transaction,
        reversal: &Transaction,
        updated: Option<&Transaction>,
        remarks: Option<String>,
    ) {
        let request = ReconciliationRequested {
            original_txn_id: original.id_typed(),
            reversal_txn_id: reversal.id_typed(),
            updated_txn_id: updated.map(Transaction::id_typed),
            remarks,
            requested_at: Utc::now(),
        };
        self.ledger
            .outbox()
            .publish(*original.id_typed().as_uuid(), &request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{bank, credit_card, new_txn};
    use crate::store::{InMemoryAccountStore, InMemoryTransactionJournal};
    use fintrack_core::{AccountId, Amount};
    use fintrack_events::{InMemoryEventBus, Subscription};
    use fintrack_transactions::{LastAction, TransactionType};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    type TestEngine = CorrectionEngine<
        Arc<InMemoryAccountStore>,
        Arc<InMemoryTransactionJournal>,
        Arc<InMemoryEventBus<AuditMessage>>,
    >;

    fn engine() -> TestEngine {
        let ledger = BalanceLedger::new(
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(InMemoryEventBus::new()),
        );
        CorrectionEngine::new(ledger, Arc::new(InMemoryTransactionJournal::new()))
    }

    fn open(engine: &TestEngine, account: fintrack_accounts::Account) -> AccountId {
        let id = account.id_typed();
        engine.ledger().store().insert(account).unwrap();
        id
    }

    fn balance(engine: &TestEngine, id: AccountId) -> Decimal {
        engine
            .ledger()
            .store()
            .find(id)
            .unwrap()
            .unwrap()
            .effective_balance()
    }

    fn reconciliations(sub: &Subscription<AuditMessage>) -> Vec<ReconciliationRequested> {
        std::iter::from_fn(|| sub.try_recv().ok())
            .filter(|m| m.event_type() == ReconciliationRequested::EVENT_TYPE)
            .map(|m| m.decode().unwrap())
            .collect()
    }

    #[test]
    fn delete_reverses_and_is_idempotent() {
        let engine = engine();
        let account = open(&engine, bank(dec!(100)));
        let txn = engine
            .create(new_txn(account, dec!(30), TransactionType::Expense))
            .unwrap();
        assert_eq!(balance(&engine, account), dec!(70));
        let sub = engine.ledger().outbox().subscribe();

        let outcome = engine.delete(txn.id_typed()).unwrap();
        let DeleteOutcome::Deleted { reversal_id } = outcome else {
            panic!("expected a reversal, got {outcome:?}");
        };
        assert_eq!(balance(&engine, account), dec!(100));

        let original = engine.find(txn.id_typed()).unwrap().unwrap();
        assert_eq!(original.status(), TransactionStatus::Inactive);
        assert_eq!(original.last_action(), LastAction::PartialDeleted);
        assert_eq!(original.details().name, "Groceries (Deleted)");
        assert_eq!(original.amount(), txn.amount());

        let reversal = engine.find(reversal_id).unwrap().unwrap();
        assert_eq!(reversal.kind(), TransactionType::Income);
        assert_eq!(reversal.reversal_of(), Some(txn.id_typed()));
        assert_eq!(reversal.details().name, "Groceries (Reversal)");

        let recs = reconciliations(&sub);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].reversal_txn_id, reversal_id);
        assert_eq!(recs[0].updated_txn_id, None);

        assert_eq!(
            engine.delete(txn.id_typed()).unwrap(),
            DeleteOutcome::AlreadyDeleted
        );
        assert_eq!(balance(&engine, account), dec!(100));
        assert_eq!(engine.reversals_of(txn.id_typed()).unwrap().len(), 1);
        assert!(reconciliations(&sub).is_empty());
    }

    #[test]
    fn reversal_rows_cannot_be_corrected() {
        let engine = engine();
        let account = open(&engine, bank(dec!(100)));
        let txn = engine
            .create(new_txn(account, dec!(10), TransactionType::Expense))
            .unwrap();
        let DeleteOutcome::Deleted { reversal_id } = engine.delete(txn.id_typed()).unwrap() else {
            panic!("expected a reversal");
        };

        assert!(matches!(
            engine.delete(reversal_id),
            Err(LedgerError::InvalidOperation(_))
        ));
        assert!(matches!(
            engine.update(reversal_id, UpdateTransactionRequest::default()),
            Err(LedgerError::InvalidOperation(_))
        ));
    }

    #[test]
    fn rejected_delete_persists_nothing() {
        let engine = engine();
        let account = open(&engine, bank(dec!(0)));
        let income = engine
            .create(new_txn(account, dec!(50), TransactionType::Income))
            .unwrap();
        engine
            .create(new_txn(account, dec!(40), TransactionType::Expense))
            .unwrap();

        // reversing the income would take the balance to -40
        let err = engine.delete(income.id_typed()).unwrap_err();
        assert!(matches!(err, LedgerError::NegativeBalance { .. }));
        assert_eq!(balance(&engine, account), dec!(10));
        let stored = engine.find(income.id_typed()).unwrap().unwrap();
        assert_eq!(stored.status(), TransactionStatus::Active);
        assert!(engine.reversals_of(income.id_typed()).unwrap().is_empty());
    }

    #[test]
    fn descriptive_update_is_merged_in_place() {
        let engine = engine();
        let account = open(&engine, bank(dec!(100)));
        let txn = engine
            .create(new_txn(account, dec!(30), TransactionType::Expense))
            .unwrap();

        let updated = engine
            .update(
                txn.id_typed(),
                UpdateTransactionRequest {
                    name: Some("Dinner".into()),
                    amount: Some(txn.amount()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.id_typed(), txn.id_typed());
        assert_eq!(updated.details().name, "Dinner");
        assert_eq!(updated.last_action(), LastAction::Updated);
        assert_eq!(balance(&engine, account), dec!(70));
        assert!(engine.reversals_of(txn.id_typed()).unwrap().is_empty());
    }

    #[test]
    fn structural_update_reverses_and_replaces() {
        let engine = engine();
        let account = open(&engine, bank(dec!(100)));
        let txn = engine
            .create(new_txn(account, dec!(30), TransactionType::Expense))
            .unwrap();
        let sub = engine.ledger().outbox().subscribe();

        let replacement = engine
            .update(
                txn.id_typed(),
                UpdateTransactionRequest {
                    amount: Some(Amount::positive(dec!(45)).unwrap()),
                    notes: Some("fixed typo".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_ne!(replacement.id_typed(), txn.id_typed());
        assert_eq!(replacement.amount().value(), dec!(45));
        assert_eq!(replacement.last_action(), LastAction::Created);
        assert_eq!(replacement.details().notes.as_deref(), Some("fixed typo"));
        assert_eq!(balance(&engine, account), dec!(55));

        let original = engine.find(txn.id_typed()).unwrap().unwrap();
        assert_eq!(original.last_action(), LastAction::Replaced);
        assert_eq!(original.amount().value(), dec!(30));

        let recs = reconciliations(&sub);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].updated_txn_id, Some(replacement.id_typed()));
    }

    #[test]
    fn rejected_replacement_reposts_the_original_values() {
        let engine = engine();
        let account = open(&engine, credit_card(dec!(0), dec!(500)));
        let txn = engine
            .create(new_txn(account, dec!(200), TransactionType::Expense))
            .unwrap();
        let sub = engine.ledger().outbox().subscribe();

        let err = engine
            .update(
                txn.id_typed(),
                UpdateTransactionRequest {
                    amount: Some(Amount::positive(dec!(900)).unwrap()),
                    ..Default::default()
                },
            )
            .unwrap_err();

        assert!(matches!(err, LedgerError::CreditLimitExceeded { .. }));
        assert_eq!(balance(&engine, account), dec!(200));

        let recs = reconciliations(&sub);
        assert_eq!(recs.len(), 1);
        let repost_id = recs[0].updated_txn_id.unwrap();
        assert!(recs[0].remarks.as_deref().unwrap().contains("re-posted"));

        let repost = engine.find(repost_id).unwrap().unwrap();
        assert_eq!(repost.amount(), txn.amount());
        assert_eq!(repost.status(), TransactionStatus::Active);
        let original = engine.find(txn.id_typed()).unwrap().unwrap();
        assert_eq!(original.last_action(), LastAction::Replaced);
    }

    #[test]
    fn zero_amount_edits_are_rejected() {
        let engine = engine();
        let account = open(&engine, bank(dec!(100)));
        let txn = engine
            .create(new_txn(account, dec!(30), TransactionType::Expense))
            .unwrap();

        let err = engine
            .update(
                txn.id_typed(),
                UpdateTransactionRequest {
                    amount: Some(Amount::ZERO),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(balance(&engine, account), dec!(70));
    }

    #[test]
    fn drafts_post_only_when_confirmed() {
        let engine = engine();
        let account = open(&engine, bank(dec!(100)));

        let draft = engine
            .create_draft(new_txn(account, dec!(25), TransactionType::Expense))
            .unwrap();
        assert_eq!(balance(&engine, account), dec!(100));

        // drafts take financial edits in place
        engine
            .update(
                draft.id_typed(),
                UpdateTransactionRequest {
                    amount: Some(Amount::positive(dec!(20)).unwrap()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(balance(&engine, account), dec!(100));

        let confirmed = engine.confirm_draft(draft.id_typed()).unwrap();
        assert_eq!(confirmed.status(), TransactionStatus::Active);
        assert_eq!(balance(&engine, account), dec!(80));
        assert!(matches!(
            engine.confirm_draft(draft.id_typed()),
            Err(LedgerError::InvalidOperation(_))
        ));

        let discarded = engine
            .create_draft(new_txn(account, dec!(5), TransactionType::Expense))
            .unwrap();
        assert_eq!(
            engine.delete(discarded.id_typed()).unwrap(),
            DeleteOutcome::DiscardedDraft
        );
        assert_eq!(
            engine.delete(discarded.id_typed()).unwrap(),
            DeleteOutcome::AlreadyDeleted
        );
        assert_eq!(balance(&engine, account), dec!(80));
    }

    #[test]
    fn concurrent_deletes_post_a_single_reversal() {
        use std::sync::Barrier;
        use std::thread;

        let engine = engine();
        let account = open(&engine, bank(dec!(100)));

        for _ in 0..50 {
            let txn = engine
                .create(new_txn(account, dec!(30), TransactionType::Expense))
                .unwrap();
            let start = Barrier::new(2);

            let outcomes: Vec<DeleteOutcome> = thread::scope(|s| {
                let workers: Vec<_> = (0..2)
                    .map(|_| {
                        s.spawn(|| {
                            start.wait();
                            engine.delete(txn.id_typed()).unwrap()
                        })
                    })
                    .collect();
                workers.into_iter().map(|w| w.join().unwrap()).collect()
            });

            let deleted = outcomes
                .iter()
                .filter(|o| matches!(o, DeleteOutcome::Deleted { .. }))
                .count();
            assert_eq!(deleted, 1, "outcomes: {outcomes:?}");
            assert!(outcomes.contains(&DeleteOutcome::AlreadyDeleted));
            assert_eq!(engine.reversals_of(txn.id_typed()).unwrap().len(), 1);
            assert_eq!(balance(&engine, account), dec!(100));
        }
    }

    /// Journal whose first multi-row batch fails.
    struct FlakyJournal {
        inner: InMemoryTransactionJournal,
        fail_next_batch: AtomicBool,
    }

    impl TransactionJournal for FlakyJournal {
        fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
            self.inner.find_by_id(id)
        }

        fn save(&self, txn: &Transaction) -> Result<(), StoreError> {
            self.inner.save(txn)
        }

        fn write_batch(
            &self,
            save: &[Transaction],
            discard: &[TransactionId],
        ) -> Result<(), StoreError> {
            if save.len() > 1 && self.fail_next_batch.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Backend("connection reset".into()));
            }
            self.inner.write_batch(save, discard)
        }

        fn find_reversals_of(
            &self,
            original: TransactionId,
        ) -> Result<Vec<Transaction>, StoreError> {
            self.inner.find_reversals_of(original)
        }
    }

    #[test]
    fn failed_journal_write_leaves_the_delete_retryable() {
        let ledger = BalanceLedger::new(
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(InMemoryEventBus::<AuditMessage>::new()),
        );
        let account = bank(dec!(100));
        let account_id = account.id_typed();
        ledger.store().insert(account).unwrap();
        let engine = CorrectionEngine::new(
            ledger,
            FlakyJournal {
                inner: InMemoryTransactionJournal::new(),
                fail_next_batch: AtomicBool::new(true),
            },
        );
        let current = || {
            engine
                .ledger()
                .store()
                .find(account_id)
                .unwrap()
                .unwrap()
                .effective_balance()
        };

        let txn = engine
            .create(new_txn(account_id, dec!(30), TransactionType::Expense))
            .unwrap();
        assert_eq!(current(), dec!(70));

        let err = engine.delete(txn.id_typed()).unwrap_err();
        assert!(matches!(err, LedgerError::Store(StoreError::Backend(_))));
        assert_eq!(current(), dec!(70));
        let stored = engine.find(txn.id_typed()).unwrap().unwrap();
        assert_eq!(stored.status(), TransactionStatus::Active);

        assert!(matches!(
            engine.delete(txn.id_typed()).unwrap(),
            DeleteOutcome::Deleted { .. }
        ));
        assert_eq!(current(), dec!(100));
        assert_eq!(
            engine.delete(txn.id_typed()).unwrap(),
            DeleteOutcome::AlreadyDeleted
        );
        assert_eq!(current(), dec!(100));
        assert_eq!(engine.reversals_of(txn.id_typed()).unwrap().len(), 1);
    }

    #[test]
    fn refused_replacement_rolls_its_row_back() {
        let engine = engine();
        let account = open(&engine, bank(dec!(100)));
        let txn = engine
            .create(new_txn(account, dec!(30), TransactionType::Expense))
            .unwrap();

        // 100 + 30 - 500 would be negative; re-posting 30 brings it back to 70
        let err = engine
            .update(
                txn.id_typed(),
                UpdateTransactionRequest {
                    amount: Some(Amount::positive(dec!(500)).unwrap()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::NegativeBalance { .. }));
        assert_eq!(balance(&engine, account), dec!(70));

        // original, reversal and repost; the refused replacement left nothing
        assert_eq!(engine.journal().len(), 3);
        let original = engine.find(txn.id_typed()).unwrap().unwrap();
        assert_eq!(original.last_action(), LastAction::Replaced);
    }

    #[test]
    fn unknown_transactions_are_not_found() {
        let engine = engine();
        let id = TransactionId::new();
        assert!(matches!(
            engine.delete(id),
            Err(LedgerError::TransactionNotFound(t)) if t == id
        ));
        assert!(matches!(
            engine.update(id, UpdateTransactionRequest::default()),
            Err(LedgerError::TransactionNotFound(_))
        ));
    }
}
