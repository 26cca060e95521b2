//! Storage contracts consumed by the ledger.
//!
//! These traits are implemented by the db crate for PostgreSQL and by
//! [`crate::memory`] for tests and embedded use.

use std::future::Future;
use std::time::Duration;

use kassa_shared::types::{AccountId, Money, TransactionId, UserId};
use thiserror::Error;

use super::types::{Account, BalanceChange, LedgerEntry, TransferCommand};

/// Errors reported by storage adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed record does not exist.
    #[error("record not found")]
    NotFound,

    /// A compare-and-set lost against a concurrent writer.
    #[error("record changed concurrently")]
    Conflict,

    /// Funds checked under lock were not enough.
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Balance observed under lock.
        available: Money,
        /// Amount requested.
        requested: Money,
    },

    /// The call did not finish before its deadline. Whether it took
    /// effect is unknown.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// Anything else the backend reports.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Durable account balances.
pub trait BalanceStore: Send + Sync {
    /// Fetch one account.
    fn get(
        &self,
        id: AccountId,
    ) -> impl Future<Output = Result<Account, StoreError>> + Send;

    /// List the accounts owned by a user.
    fn list_by_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Account>, StoreError>> + Send;

    /// Persist a newly opened account.
    fn insert(&self, account: Account) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete an account whose balance is zero.
    ///
    /// Returns `Conflict` if the stored balance is not zero.
    fn delete_empty(&self, id: AccountId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Compare-and-set the balance and append the entry in one unit.
    ///
    /// Returns `Conflict` if the stored balance differs from
    /// `change.expected_balance`; nothing is written in that case.
    fn apply_change(
        &self,
        change: BalanceChange,
    ) -> impl Future<Output = Result<Account, StoreError>> + Send;

    /// Debit, credit and append the transfer entry in one unit.
    ///
    /// Implementations serialize on both accounts and re-check funds; on any
    /// failure neither balance changes.
    fn transfer_atomic(
        &self,
        command: TransferCommand,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Append-only record of balance-affecting events.
pub trait TransactionLog: Send + Sync {
    /// All entries where the account is source or destination.
    fn history(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, StoreError>> + Send;

    /// One entry by id.
    fn find(
        &self,
        id: TransactionId,
    ) -> impl Future<Output = Result<Option<LedgerEntry>, StoreError>> + Send;
}

/// Runs a storage call with an upper bound on its duration.
pub async fn with_deadline<T, F>(
    deadline: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .unwrap_or(Err(StoreError::Timeout(operation)))
}
