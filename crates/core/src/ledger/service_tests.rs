//! Unit tests for the ledger service over the in-memory store.

use std::sync::Arc;

use kassa_shared::Caller;
use kassa_shared::config::LedgerConfig;
use kassa_shared::types::{AccountId, Money, TransactionId, UserId};

use super::error::LedgerError;
use super::service::Ledger;
use super::types::{AdjustBalanceInput, TransactionKind, TransferInput};
use crate::memory::InMemoryLedgerStore;

type TestLedger = Ledger<InMemoryLedgerStore, InMemoryLedgerStore>;

fn setup() -> (Arc<InMemoryLedgerStore>, TestLedger) {
    let store = Arc::new(InMemoryLedgerStore::new());
    let ledger = Ledger::new(Arc::clone(&store), Arc::clone(&store), &LedgerConfig::default());
    (store, ledger)
}

fn caller() -> Caller {
    Caller::new(UserId::new())
}

fn input(account_id: AccountId, minor: i64, kind: TransactionKind) -> AdjustBalanceInput {
    AdjustBalanceInput {
        account_id,
        amount: Money::from_minor(minor),
        kind,
        description: kind.to_string(),
    }
}

async fn funded(ledger: &TestLedger, owner: &Caller, minor: i64) -> AccountId {
    let account = ledger.open_account(owner).await.unwrap();
    if minor > 0 {
        ledger
            .adjust_balance(owner, input(account.id, minor, TransactionKind::Deposit))
            .await
            .unwrap();
    }
    account.id
}

async fn balance(ledger: &TestLedger, owner: &Caller, id: AccountId) -> i64 {
    ledger.get_account(owner, id).await.unwrap().balance.minor()
}

// ========== Accounts ==========

#[tokio::test]
async fn test_open_and_list_accounts() {
    let (_, ledger) = setup();
    let alice = caller();
    let bob = caller();

    let a1 = ledger.open_account(&alice).await.unwrap();
    let a2 = ledger.open_account(&alice).await.unwrap();
    ledger.open_account(&bob).await.unwrap();

    let mut listed: Vec<_> = ledger
        .list_accounts(&alice)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    listed.sort();
    let mut expected = vec![a1.id, a2.id];
    expected.sort();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn test_get_account_checks_owner() {
    let (_, ledger) = setup();
    let alice = caller();
    let id = funded(&ledger, &alice, 0).await;

    let err = ledger.get_account(&caller(), id).await.unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(a) if a == id));

    let err = ledger.get_account(&alice, AccountId::new()).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));
}

#[tokio::test]
async fn test_close_account_requires_zero_balance() {
    let (_, ledger) = setup();
    let alice = caller();
    let id = funded(&ledger, &alice, 500).await;

    let err = ledger.close_account(&alice, id).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotEmpty { .. }));

    ledger
        .adjust_balance(&alice, input(id, 500, TransactionKind::Withdrawal))
        .await
        .unwrap();
    ledger.close_account(&alice, id).await.unwrap();

    let err = ledger.get_account(&alice, id).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));
}

// ========== Adjustments ==========

#[tokio::test]
async fn test_deposit_and_withdrawal() {
    let (store, ledger) = setup();
    let alice = caller();
    let id = funded(&ledger, &alice, 10_000).await;

    let result = ledger
        .adjust_balance(&alice, input(id, 2_500, TransactionKind::Withdrawal))
        .await
        .unwrap();
    assert_eq!(result.account.balance.minor(), 7_500);

    let entries = store.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].id, result.transaction_id);
    assert_eq!(entries[1].kind, TransactionKind::Withdrawal);
    assert_eq!(entries[1].from_account, Some(id));
    assert_eq!(entries[1].to_account, None);
}

#[tokio::test]
async fn test_withdrawal_insufficient_funds() {
    let (store, ledger) = setup();
    let alice = caller();
    let id = funded(&ledger, &alice, 1_000).await;

    let err = ledger
        .adjust_balance(&alice, input(id, 1_001, TransactionKind::Withdrawal))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientFunds { available, requested }
            if available.minor() == 1_000 && requested.minor() == 1_001
    ));
    assert_eq!(balance(&ledger, &alice, id).await, 1_000);
    assert_eq!(store.entries().len(), 1);
}

#[tokio::test]
async fn test_adjust_rejects_bad_input() {
    let (_, ledger) = setup();
    let alice = caller();
    let id = funded(&ledger, &alice, 1_000).await;

    let err = ledger
        .adjust_balance(&alice, input(id, 0, TransactionKind::Deposit))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ZeroAmount));

    let err = ledger
        .adjust_balance(&alice, input(id, -10, TransactionKind::Deposit))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NegativeAmount));

    let err = ledger
        .adjust_balance(&alice, input(id, 10, TransactionKind::Transfer))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));
}

#[tokio::test]
async fn test_adjust_by_non_owner_changes_nothing() {
    let (store, ledger) = setup();
    let alice = caller();
    let id = funded(&ledger, &alice, 1_000).await;

    for kind in [TransactionKind::Deposit, TransactionKind::Withdrawal] {
        let err = ledger
            .adjust_balance(&caller(), input(id, 100, kind))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized(_)));
    }
    assert_eq!(balance(&ledger, &alice, id).await, 1_000);
    assert_eq!(store.entries().len(), 1);
}

#[tokio::test]
async fn test_card_payment_debits_account() {
    let (store, ledger) = setup();
    let alice = caller();
    let id = funded(&ledger, &alice, 5_000).await;

    let result = ledger
        .record_card_payment(&alice, id, Money::from_minor(1_250), "coffee")
        .await
        .unwrap();
    assert_eq!(result.account.balance.minor(), 3_750);

    let entry = store.entries().pop().unwrap();
    assert_eq!(entry.kind, TransactionKind::Payment);
    assert_eq!(entry.description, "coffee");
}

#[tokio::test]
async fn test_loan_credit_increases_balance() {
    let (_, ledger) = setup();
    let alice = caller();
    let id = funded(&ledger, &alice, 0).await;

    let result = ledger
        .adjust_balance(&alice, input(id, 100_000, TransactionKind::Loan))
        .await
        .unwrap();
    assert_eq!(result.account.balance.minor(), 100_000);
}

#[tokio::test]
async fn test_conflict_is_retried() {
    let (store, ledger) = setup();
    let alice = caller();
    let id = funded(&ledger, &alice, 1_000).await;

    store.inject_conflicts(2);
    let result = ledger
        .adjust_balance(&alice, input(id, 500, TransactionKind::Deposit))
        .await
        .unwrap();
    assert_eq!(result.account.balance.minor(), 1_500);
    assert_eq!(store.entries().len(), 2);
}

#[tokio::test]
async fn test_retried_adjustment_keeps_chosen_entry_id() {
    let (store, ledger) = setup();
    let alice = caller();
    let id = funded(&ledger, &alice, 0).await;
    let transaction_id = TransactionId::new();

    store.inject_conflicts(2);
    let result = ledger
        .adjust_balance_with_id(&alice, input(id, 700, TransactionKind::Deposit), transaction_id)
        .await
        .unwrap();

    assert_eq!(result.transaction_id, transaction_id);
    let found = ledger
        .find_transaction(&alice, id, transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.amount.minor(), 700);
    assert_eq!(found.to_account, Some(id));
}

#[tokio::test]
async fn test_find_transaction_scoped_to_owned_account() {
    let (_, ledger) = setup();
    let alice = caller();
    let bob = caller();
    let mine = funded(&ledger, &alice, 0).await;
    let other = funded(&ledger, &alice, 0).await;
    let result = ledger
        .adjust_balance(&alice, input(mine, 300, TransactionKind::Deposit))
        .await
        .unwrap();

    let missing = ledger
        .find_transaction(&alice, mine, TransactionId::new())
        .await
        .unwrap();
    assert!(missing.is_none());

    let elsewhere = ledger
        .find_transaction(&alice, other, result.transaction_id)
        .await
        .unwrap();
    assert!(elsewhere.is_none());

    let err = ledger
        .find_transaction(&bob, mine, result.transaction_id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));
}

#[tokio::test]
async fn test_conflict_retries_are_bounded() {
    let (store, ledger) = setup();
    let alice = caller();
    let id = funded(&ledger, &alice, 1_000).await;

    store.inject_conflicts(LedgerConfig::default().max_retries + 1);
    let err = ledger
        .adjust_balance(&alice, input(id, 500, TransactionKind::Deposit))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ConcurrentModification(_)));
    assert!(err.is_retryable());
    assert_eq!(balance(&ledger, &alice, id).await, 1_000);
}

#[tokio::test]
async fn test_storage_failure_is_reported() {
    let (store, ledger) = setup();
    let alice = caller();
    let id = funded(&ledger, &alice, 1_000).await;

    store.fail_changes_on(id);
    let err = ledger
        .adjust_balance(&alice, input(id, 500, TransactionKind::Deposit))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Storage(_)));
    assert_eq!(err.http_status_code(), 500);
}

// ========== Transfers ==========

fn transfer(from: AccountId, to: AccountId, minor: i64) -> TransferInput {
    TransferInput {
        from,
        to,
        amount: Money::from_minor(minor),
        description: "rent".to_string(),
    }
}

#[tokio::test]
async fn test_transfer_moves_funds() {
    let (store, ledger) = setup();
    let alice = caller();
    let bob = caller();
    let from = funded(&ledger, &alice, 10_000).await;
    let to = funded(&ledger, &bob, 0).await;

    let result = ledger.transfer(&alice, transfer(from, to, 4_000)).await.unwrap();

    assert_eq!(balance(&ledger, &alice, from).await, 6_000);
    assert_eq!(balance(&ledger, &bob, to).await, 4_000);

    let entry = store.entries().pop().unwrap();
    assert_eq!(entry.id, result.transaction_id);
    assert_eq!(entry.kind, TransactionKind::Transfer);
    assert_eq!(entry.from_account, Some(from));
    assert_eq!(entry.to_account, Some(to));
}

#[tokio::test]
async fn test_transfer_requires_source_owner() {
    let (store, ledger) = setup();
    let alice = caller();
    let bob = caller();
    let from = funded(&ledger, &alice, 10_000).await;
    let to = funded(&ledger, &bob, 0).await;

    let err = ledger.transfer(&bob, transfer(from, to, 100)).await.unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(a) if a == from));
    assert_eq!(store.total_balance(), 10_000);
    assert_eq!(balance(&ledger, &alice, from).await, 10_000);
}

#[tokio::test]
async fn test_transfer_validation() {
    let (_, ledger) = setup();
    let alice = caller();
    let from = funded(&ledger, &alice, 1_000).await;
    let to = funded(&ledger, &alice, 0).await;

    let err = ledger.transfer(&alice, transfer(from, to, 0)).await.unwrap_err();
    assert!(matches!(err, LedgerError::ZeroAmount));

    let err = ledger.transfer(&alice, transfer(from, from, 10)).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));

    let err = ledger
        .transfer(&alice, transfer(from, AccountId::new(), 10))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));

    let err = ledger.transfer(&alice, transfer(from, to, 1_001)).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
}

#[tokio::test]
async fn test_failed_credit_leaves_debit_unapplied() {
    let (store, ledger) = setup();
    let alice = caller();
    let bob = caller();
    let from = funded(&ledger, &alice, 10_000).await;
    let to = funded(&ledger, &bob, 2_000).await;
    let entries_before = store.entries().len();

    store.fail_transfer_credit_to(to);
    let err = ledger.transfer(&alice, transfer(from, to, 3_000)).await.unwrap_err();

    assert!(matches!(err, LedgerError::Storage(_)));
    assert_eq!(balance(&ledger, &alice, from).await, 10_000);
    assert_eq!(balance(&ledger, &bob, to).await, 2_000);
    assert_eq!(store.entries().len(), entries_before);
}

#[tokio::test]
async fn test_concurrent_transfers_do_not_lose_updates() {
    let (store, ledger) = setup();
    let ledger = Arc::new(ledger);
    let alice = caller();
    let from = funded(&ledger, &alice, 100_000).await;
    let to = funded(&ledger, &alice, 0).await;

    let mut handles = Vec::new();
    for _ in 0..50 {
        let ledger = Arc::clone(&ledger);
        handles.push(tokio::spawn(async move {
            ledger.transfer(&alice, transfer(from, to, 100)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(balance(&ledger, &alice, from).await, 95_000);
    assert_eq!(balance(&ledger, &alice, to).await, 5_000);
    assert_eq!(store.total_balance(), 100_000);
}

// ========== History ==========

#[tokio::test]
async fn test_history_lists_both_sides() {
    let (_, ledger) = setup();
    let alice = caller();
    let bob = caller();
    let a = funded(&ledger, &alice, 5_000).await;
    let b = funded(&ledger, &bob, 5_000).await;

    ledger.transfer(&alice, transfer(a, b, 1_000)).await.unwrap();
    ledger.transfer(&bob, transfer(b, a, 200)).await.unwrap();

    let history = ledger.transaction_history(&alice, a).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|e| e.involves(a)));

    let deposit = history
        .iter()
        .find(|e| e.kind == TransactionKind::Deposit)
        .unwrap();
    assert_eq!(deposit.from_account, None);
}

#[tokio::test]
async fn test_history_checks_owner() {
    let (_, ledger) = setup();
    let alice = caller();
    let a = funded(&ledger, &alice, 5_000).await;

    let err = ledger.transaction_history(&caller(), a).await.unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));
}
