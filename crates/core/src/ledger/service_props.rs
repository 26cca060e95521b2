//! Property-based tests for the ledger service.
//!
//! - Conservation: total balance moves only by deposits minus withdrawals
//! - Atomicity: a transfer whose credit fails leaves both balances unchanged

use std::sync::Arc;

use kassa_shared::Caller;
use kassa_shared::config::LedgerConfig;
use kassa_shared::types::{AccountId, Money, UserId};
use proptest::prelude::*;

use super::service::Ledger;
use super::types::{AdjustBalanceInput, TransactionKind, TransferInput};
use crate::memory::InMemoryLedgerStore;

const ACCOUNTS: usize = 4;

#[derive(Debug, Clone)]
enum Op {
    Deposit(usize, i64),
    Withdraw(usize, i64),
    Pay(usize, i64),
    Transfer(usize, usize, i64),
}

/// Strategy to generate positive amounts (0.01 to 1,000.00).
fn amount() -> impl Strategy<Value = i64> {
    1i64..100_000i64
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let idx = 0..ACCOUNTS;
    prop_oneof![
        (idx.clone(), amount()).prop_map(|(a, m)| Op::Deposit(a, m)),
        (idx.clone(), amount()).prop_map(|(a, m)| Op::Withdraw(a, m)),
        (idx.clone(), amount()).prop_map(|(a, m)| Op::Pay(a, m)),
        (idx.clone(), idx, amount()).prop_map(|(a, b, m)| Op::Transfer(a, b, m)),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn adjust(account_id: AccountId, minor: i64, kind: TransactionKind) -> AdjustBalanceInput {
    AdjustBalanceInput {
        account_id,
        amount: Money::from_minor(minor),
        kind,
        description: String::new(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_conservation(ops in prop::collection::vec(op_strategy(), 1..40)) {
        runtime().block_on(async {
            let store = Arc::new(InMemoryLedgerStore::new());
            let ledger = Ledger::new(Arc::clone(&store), Arc::clone(&store), &LedgerConfig::default());
            let owner = Caller::new(UserId::new());

            let mut accounts = Vec::new();
            for _ in 0..ACCOUNTS {
                accounts.push(ledger.open_account(&owner).await.unwrap().id);
            }

            let mut expected: i64 = 0;
            for op in ops {
                match op {
                    Op::Deposit(a, m) => {
                        if ledger.adjust_balance(&owner, adjust(accounts[a], m, TransactionKind::Deposit)).await.is_ok() {
                            expected += m;
                        }
                    }
                    Op::Withdraw(a, m) => {
                        if ledger.adjust_balance(&owner, adjust(accounts[a], m, TransactionKind::Withdrawal)).await.is_ok() {
                            expected -= m;
                        }
                    }
                    Op::Pay(a, m) => {
                        if ledger.record_card_payment(&owner, accounts[a], Money::from_minor(m), "").await.is_ok() {
                            expected -= m;
                        }
                    }
                    Op::Transfer(a, b, m) => {
                        let _ = ledger.transfer(&owner, TransferInput {
                            from: accounts[a],
                            to: accounts[b],
                            amount: Money::from_minor(m),
                            description: String::new(),
                        }).await;
                    }
                }
                prop_assert_eq!(store.total_balance(), expected);
            }

            for id in &accounts {
                let account = ledger.get_account(&owner, *id).await.unwrap();
                prop_assert!(!account.balance.is_negative());
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_failed_credit_is_atomic(
        start_from in 0i64..1_000_000i64,
        start_to in 0i64..1_000_000i64,
        minor in amount(),
    ) {
        runtime().block_on(async {
            let store = Arc::new(InMemoryLedgerStore::new());
            let ledger = Ledger::new(Arc::clone(&store), Arc::clone(&store), &LedgerConfig::default());
            let owner = Caller::new(UserId::new());

            let from = ledger.open_account(&owner).await.unwrap().id;
            let to = ledger.open_account(&owner).await.unwrap().id;
            for (id, m) in [(from, start_from), (to, start_to)] {
                if m > 0 {
                    ledger.adjust_balance(&owner, adjust(id, m, TransactionKind::Deposit)).await.unwrap();
                }
            }
            let entries_before = store.entries().len();

            store.fail_transfer_credit_to(to);
            let result = ledger.transfer(&owner, TransferInput {
                from,
                to,
                amount: Money::from_minor(minor),
                description: String::new(),
            }).await;

            prop_assert!(result.is_err());
            prop_assert_eq!(ledger.get_account(&owner, from).await.unwrap().balance.minor(), start_from);
            prop_assert_eq!(ledger.get_account(&owner, to).await.unwrap().balance.minor(), start_to);
            prop_assert_eq!(store.entries().len(), entries_before);
            Ok(())
        })?;
    }
}
