//! Account balances and the transaction log.
//!
//! This module implements the ledger:
//! - Domain types for accounts and ledger entries
//! - Storage contracts for balances and the log
//! - Error types for ledger operations
//! - The ledger service enforcing ownership and sufficiency

pub mod error;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod service_tests;

pub use error::LedgerError;
pub use service::Ledger;
pub use store::{BalanceStore, StoreError, TransactionLog, with_deadline};
pub use types::{
    Account, AdjustBalanceInput, AdjustmentResult, BalanceChange, Direction, LedgerEntry,
    TransactionKind, TransferCommand, TransferInput, TransferResult,
};
