//! Storage contracts consumed by the loan issuer and the overdue scheduler.

use std::future::Future;

use chrono::{DateTime, Utc};
use kassa_shared::types::{LoanId, PaymentId};

use super::types::{Loan, ScheduledPayment};
use crate::ledger::StoreError;

/// Durable loans.
pub trait LoanStore: Send + Sync {
    /// Persist a loan and every row of `loan.payments` as one unit.
    ///
    /// If any row fails to persist, the loan record is not created either.
    fn create_with_schedule(
        &self,
        loan: &Loan,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch a loan. `payments` is left empty.
    fn get(&self, id: LoanId) -> impl Future<Output = Result<Loan, StoreError>> + Send;

    /// Remove a loan together with its schedule.
    fn discard(&self, id: LoanId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Durable repayment schedules.
pub trait ScheduleStore: Send + Sync {
    /// Payments of one loan ordered by due date.
    fn get_by_loan(
        &self,
        loan_id: LoanId,
    ) -> impl Future<Output = Result<Vec<ScheduledPayment>, StoreError>> + Send;

    /// Payments with `due_date < now`, `is_paid = false` and `status = new`.
    fn get_overdue(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ScheduledPayment>, StoreError>> + Send;

    /// Move one payment from `new` to `overdue`.
    ///
    /// The write only applies while the row is still `new` and unpaid.
    /// Returns whether the row changed.
    fn mark_overdue(&self, id: PaymentId) -> impl Future<Output = Result<bool, StoreError>> + Send;
}
