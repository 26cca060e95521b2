//! In-process storage adapters.
//!
//! Both stores keep everything behind a single mutex, which serializes every
//! mutation and makes each trait call atomic. They also expose switches for
//! injecting failures into specific steps.

mod ledger;
mod loans;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use ledger::InMemoryLedgerStore;
pub use loans::InMemoryLoanStore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
