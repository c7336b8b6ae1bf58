//! Integration tests for the full ledger pipeline.
//!
//! Tests: request → row lock → balance commit → audit bus → worker → recorders
//!
//! Verifies:
//! - The worked scenarios (expense on an asset, rejected charge, idempotent delete)
//! - Same-account mutations serialize, different accounts do not wait
//! - Balance invariants hold under concurrent load
//! - Corrections leave consistent balances, journal rows and audit rows

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use fintrack_accounts::{AccountType, NewAccount};
    use fintrack_core::{AccountId, Amount, TransactionId, UserId};
    use fintrack_transactions::{
        ReconciliationStatus, TransactionStatus, TransactionType, UpdateTransactionRequest,
    };

    use crate::config::LedgerConfig;
    use crate::correction::DeleteOutcome;
    use crate::error::LedgerError;
    use crate::fixtures::new_txn;
    use crate::services::InMemoryServices;
    use crate::store::AccountStore;

    fn setup() -> InMemoryServices {
        fintrack_observability::init_for_tests();
        InMemoryServices::in_memory(&LedgerConfig::default()).unwrap()
    }

    fn open_bank(services: &InMemoryServices, starting: Decimal, last_four: &str) -> AccountId {
        services
            .accounts
            .open_account(NewAccount {
                name: "Checking".into(),
                account_type: Some(AccountType::Bank),
                last_four: last_four.into(),
                currency: "USD".into(),
                starting_balance: Some(starting),
                ..NewAccount::default()
            })
            .unwrap()
            .id_typed()
    }

    fn open_card(services: &InMemoryServices, outstanding: Decimal, limit: Decimal) -> AccountId {
        services
            .accounts
            .open_account(NewAccount {
                name: "Visa".into(),
                account_type: Some(AccountType::CreditCard),
                last_four: "4242".into(),
                currency: "USD".into(),
                current_outstanding: Some(outstanding),
                credit_limit: Some(limit),
                ..NewAccount::default()
            })
            .unwrap()
            .id_typed()
    }

    fn balance(services: &InMemoryServices, id: AccountId) -> Decimal {
        services.accounts.get(id).unwrap().effective_balance()
    }

    /// Poll until `check` holds; the audit worker records asynchronously.
    fn eventually(mut check: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if check() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached within 2s");
    }

    #[test]
    fn expense_on_asset_commits_and_records_a_matching_snapshot() {
        let services = setup();
        let account = open_bank(&services, dec!(100), "1111");
        let txn = TransactionId::new();

        let effect = services
            .ledger()
            .apply(account, dec!(30), TransactionType::Expense, txn)
            .unwrap();

        assert_eq!((effect.balance_before, effect.balance_after), (dec!(100), dec!(70)));
        assert_eq!(balance(&services, account), dec!(70));

        eventually(|| services.snapshots.for_transaction(txn).unwrap().len() == 1);
        let snapshot = &services.snapshots.for_transaction(txn).unwrap()[0];
        assert!(snapshot.matches(&effect));
        assert_eq!(snapshot.transaction_amount, dec!(30));

        services.shutdown();
    }

    #[test]
    fn charge_past_the_credit_limit_leaves_no_trace() {
        let services = setup();
        let card = open_card(&services, dec!(200), dec!(500));
        let txn = TransactionId::new();

        let err = services
            .ledger()
            .apply(card, dec!(400), TransactionType::Expense, txn)
            .unwrap_err();
        assert!(matches!(err, LedgerError::CreditLimitExceeded { .. }));
        assert!(err.is_balance_rejection());
        assert_eq!(balance(&services, card), dec!(200));

        // a committed mutation after it proves the worker is draining
        let probe = TransactionId::new();
        services
            .ledger()
            .apply(card, dec!(300), TransactionType::Expense, probe)
            .unwrap();
        eventually(|| !services.snapshots.for_transaction(probe).unwrap().is_empty());

        assert!(services.snapshots.for_transaction(txn).unwrap().is_empty());
        assert_eq!(services.snapshots.for_account(card).unwrap().len(), 1);
        assert_eq!(balance(&services, card), dec!(500));

        services.shutdown();
    }

    #[test]
    fn delete_is_idempotent_and_reconciled_once() {
        let services = setup();
        let account = open_bank(&services, dec!(100), "2222");
        let txn = services
            .engine
            .create(new_txn(account, dec!(30), TransactionType::Expense))
            .unwrap();

        assert!(matches!(
            services.engine.delete(txn.id_typed()).unwrap(),
            DeleteOutcome::Deleted { .. }
        ));
        assert_eq!(
            services.engine.delete(txn.id_typed()).unwrap(),
            DeleteOutcome::AlreadyDeleted
        );

        assert_eq!(balance(&services, account), dec!(100));
        assert_eq!(services.engine.reversals_of(txn.id_typed()).unwrap().len(), 1);

        eventually(|| {
            services
                .reconciliations
                .for_original(txn.id_typed())
                .unwrap()
                .len()
                == 1
        });
        let recs = services.reconciliations.for_original(txn.id_typed()).unwrap();
        assert_eq!(recs[0].status, ReconciliationStatus::Pending);
        assert_eq!(recs[0].updated_txn_id, None);

        let done = services
            .reconciliations
            .complete(recs[0].id, Some("matched bank statement".into()))
            .unwrap();
        assert_eq!(done.status, ReconciliationStatus::Completed);

        // create + reversal; the second delete wrote nothing
        eventually(|| services.snapshots.for_account(account).unwrap().len() == 2);
        services.shutdown();
    }

    #[test]
    fn structural_update_records_reversal_replacement_and_reconciliation() {
        let services = setup();
        let account = open_bank(&services, dec!(120), "2323");
        let txn = services
            .engine
            .create(new_txn(account, dec!(50), TransactionType::Expense))
            .unwrap();
        assert_eq!(balance(&services, account), dec!(70));

        let replacement = services
            .engine
            .update(
                txn.id_typed(),
                UpdateTransactionRequest {
                    amount: Some(Amount::positive(dec!(80)).unwrap()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(balance(&services, account), dec!(40));

        let reversals = services.engine.reversals_of(txn.id_typed()).unwrap();
        assert_eq!(reversals.len(), 1);
        let reversal_id = reversals[0].id_typed();

        eventually(|| services.snapshots.for_account(account).unwrap().len() == 3);
        let reversal_snap = &services.snapshots.for_transaction(reversal_id).unwrap()[0];
        assert_eq!(
            (reversal_snap.balance_before, reversal_snap.balance_after),
            (dec!(70), dec!(120))
        );
        assert_eq!(reversal_snap.transaction_amount, dec!(50));
        let replacement_snap = &services
            .snapshots
            .for_transaction(replacement.id_typed())
            .unwrap()[0];
        assert_eq!(
            (replacement_snap.balance_before, replacement_snap.balance_after),
            (dec!(120), dec!(40))
        );
        assert_eq!(replacement_snap.transaction_amount, dec!(80));

        eventually(|| {
            !services
                .reconciliations
                .for_original(txn.id_typed())
                .unwrap()
                .is_empty()
        });
        let recs = services.reconciliations.for_original(txn.id_typed()).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].original_txn_id, txn.id_typed());
        assert_eq!(recs[0].reversal_txn_id, reversal_id);
        assert_eq!(recs[0].updated_txn_id, Some(replacement.id_typed()));
        assert_eq!(recs[0].status, ReconciliationStatus::Pending);

        let original = services.engine.find(txn.id_typed()).unwrap().unwrap();
        assert_eq!(original.status(), TransactionStatus::Inactive);
        assert_eq!(original.amount().value(), dec!(50));

        services.shutdown();
    }

    #[test]
    fn same_account_mutations_serialize_without_lost_updates() {
        let services = setup();
        let account = open_bank(&services, dec!(100), "3333");
        let ledger = services.ledger();

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..25 {
                        ledger
                            .apply(account, dec!(1), TransactionType::Income, TransactionId::new())
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(balance(&services, account), dec!(300));

        eventually(|| services.snapshots.for_account(account).unwrap().len() == 200);
        let snapshots = services.snapshots.for_account(account).unwrap();
        let befores: BTreeSet<Decimal> = snapshots.iter().map(|s| s.balance_before).collect();
        assert_eq!(befores.len(), 200, "two mutations observed the same balance");
        assert!(snapshots.iter().all(|s| s.balance_after - s.balance_before == dec!(1)));

        services.shutdown();
    }

    #[test]
    fn concurrent_expenses_never_overdraw_an_asset() {
        let services = setup();
        let account = open_bank(&services, dec!(100), "4444");
        let ledger = services.ledger();

        let results: Vec<Result<_, LedgerError>> = thread::scope(|s| {
            let handles: Vec<_> = (0..20)
                .map(|_| {
                    s.spawn(|| {
                        ledger.apply(account, dec!(10), TransactionType::Expense, TransactionId::new())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let committed = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::NegativeBalance { .. })))
            .count();
        assert_eq!((committed, rejected), (10, 10));
        assert_eq!(balance(&services, account), Decimal::ZERO);

        services.shutdown();
    }

    #[test]
    fn held_row_blocks_its_account_but_not_others() {
        let services = setup();
        let busy = open_bank(&services, dec!(50), "5555");
        let free = open_bank(&services, dec!(50), "6666");
        let ledger = services.ledger();

        let guard = ledger.store().lock_for_update(busy, None).unwrap();

        thread::scope(|s| {
            let (busy_tx, busy_rx) = mpsc::channel();
            let (free_tx, free_rx) = mpsc::channel();

            s.spawn(move || {
                let r = ledger.apply(busy, dec!(5), TransactionType::Income, TransactionId::new());
                let _ = busy_tx.send(r.map(|e| e.balance_after));
            });
            s.spawn(move || {
                let r = ledger.apply(free, dec!(5), TransactionType::Income, TransactionId::new());
                let _ = free_tx.send(r.map(|e| e.balance_after));
            });

            let free_result = free_rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(free_result.unwrap(), dec!(55));

            assert!(busy_rx.recv_timeout(Duration::from_millis(100)).is_err());
            drop(guard);
            let busy_result = busy_rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(busy_result.unwrap(), dec!(55));
        });

        services.shutdown();
    }

    #[test]
    fn bounded_lock_wait_reports_a_timeout() {
        let config = LedgerConfig {
            lock_timeout: Some(Duration::from_millis(30)),
            ..LedgerConfig::default()
        };
        fintrack_observability::init_for_tests();
        let services = InMemoryServices::in_memory(&config).unwrap();
        let account = open_bank(&services, dec!(10), "7777");

        let guard = services.ledger().store().lock_for_update(account, None).unwrap();
        let err = services
            .ledger()
            .apply(account, dec!(1), TransactionType::Income, TransactionId::new())
            .unwrap_err();
        assert!(matches!(err, LedgerError::LockTimeout(id) if id == account));
        drop(guard);

        assert_eq!(balance(&services, account), dec!(10));
        services.shutdown();
    }

    #[test]
    fn flipped_mutation_restores_the_balance() {
        let services = setup();
        let card = open_card(&services, dec!(120), dec!(1000));

        for (amount, kind) in [
            (dec!(80), TransactionType::Expense),
            (dec!(35.5), TransactionType::Income),
            (dec!(0), TransactionType::Expense),
        ] {
            let before = balance(&services, card);
            services
                .ledger()
                .apply(card, amount, kind, TransactionId::new())
                .unwrap();
            services
                .ledger()
                .apply(card, amount, kind.flipped(), TransactionId::new())
                .unwrap();
            assert_eq!(balance(&services, card), before);
        }

        services.shutdown();
    }

    #[test]
    fn moving_a_transaction_between_accounts() {
        let services = setup();
        let from = open_bank(&services, dec!(100), "8888");
        let to = open_bank(&services, dec!(100), "9999");
        let txn = services
            .engine
            .create(new_txn(from, dec!(40), TransactionType::Expense))
            .unwrap();

        let replacement = services
            .engine
            .update(
                txn.id_typed(),
                UpdateTransactionRequest {
                    account: Some(to),
                    amount: Some(Amount::positive(dec!(25)).unwrap()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(balance(&services, from), dec!(100));
        assert_eq!(balance(&services, to), dec!(75));
        assert_eq!(replacement.account(), to);
        assert_eq!(replacement.status(), TransactionStatus::Active);

        eventually(|| {
            services
                .reconciliations
                .for_original(txn.id_typed())
                .unwrap()
                .first()
                .is_some_and(|r| r.updated_txn_id == Some(replacement.id_typed()))
        });
        services.shutdown();
    }

    #[test]
    fn closed_accounts_reject_mutations_and_leave_net_worth() {
        let services = setup();
        let user = UserId::new();
        let wallet = services
            .accounts
            .open_account(NewAccount {
                user_id: Some(user),
                name: "Wallet".into(),
                account_type: Some(AccountType::Cash),
                last_four: "0001".into(),
                currency: "USD".into(),
                starting_balance: Some(dec!(40)),
                ..NewAccount::default()
            })
            .unwrap();
        services
            .accounts
            .open_account(NewAccount {
                user_id: Some(user),
                name: "Loan".into(),
                account_type: Some(AccountType::Loan),
                last_four: "0002".into(),
                currency: "USD".into(),
                current_outstanding: Some(dec!(15)),
                ..NewAccount::default()
            })
            .unwrap();

        assert_eq!(services.accounts.net_worth(Some(user)).unwrap().net_worth, dec!(25));

        services.accounts.close_account(wallet.id_typed()).unwrap();
        let err = services
            .engine
            .create(new_txn(wallet.id_typed(), dec!(1), TransactionType::Income))
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));

        let summary = services.accounts.net_worth(Some(user)).unwrap();
        assert_eq!(summary.assets.count, 0);
        assert_eq!(summary.net_worth, dec!(-15));

        services.shutdown();
    }
}
