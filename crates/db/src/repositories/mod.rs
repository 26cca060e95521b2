//! Repository implementations of the core storage traits.

pub mod account;
pub mod loan;
pub mod payment;
pub mod transaction;
pub mod user;

pub use account::AccountRepository;
pub use loan::LoanRepository;
pub use payment::PaymentRepository;
pub use transaction::TransactionRepository;
pub use user::UserRepository;

use kassa_core::ledger::StoreError;
use sea_orm::DbErr;

/// Wraps a database error for the core storage boundary.
pub(crate) fn backend(err: DbErr) -> StoreError {
    StoreError::Backend(err.to_string())
}
