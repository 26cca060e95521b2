use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use kassa_shared::types::{LoanId, PaymentId};

use super::lock;
use crate::ledger::StoreError;
use crate::loan::{Loan, LoanStore, PaymentStatus, ScheduleStore, ScheduledPayment};

#[derive(Debug, Default)]
struct State {
    loans: BTreeMap<LoanId, Loan>,
    payments: BTreeMap<PaymentId, ScheduledPayment>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_schedule_writes: bool,
    fail_overdue_query: bool,
    failing_updates: HashSet<PaymentId>,
}

/// Loan and schedule store held in memory.
#[derive(Debug, Default)]
pub struct InMemoryLoanStore {
    state: Mutex<State>,
    faults: Mutex<Faults>,
}

impl InMemoryLoanStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make schedule persistence fail.
    pub fn fail_schedule_writes(&self) {
        lock(&self.faults).fail_schedule_writes = true;
    }

    /// Make the overdue query fail.
    pub fn fail_overdue_query(&self) {
        lock(&self.faults).fail_overdue_query = true;
    }

    /// Make status updates of one payment fail.
    pub fn fail_update_of(&self, id: PaymentId) {
        lock(&self.faults).failing_updates.insert(id);
    }

    /// Remove all injected failures.
    pub fn clear_faults(&self) {
        *lock(&self.faults) = Faults::default();
    }

    /// Record a payment as settled.
    pub fn settle(&self, id: PaymentId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        let payment = state.payments.get_mut(&id).ok_or(StoreError::NotFound)?;
        payment.status = PaymentStatus::Paid;
        payment.is_paid = true;
        payment.paid_date = Some(at);
        Ok(())
    }

    /// Number of stored loans.
    #[must_use]
    pub fn loan_count(&self) -> usize {
        lock(&self.state).loans.len()
    }

    /// Every stored payment.
    #[must_use]
    pub fn payments(&self) -> Vec<ScheduledPayment> {
        lock(&self.state).payments.values().cloned().collect()
    }
}

impl LoanStore for InMemoryLoanStore {
    async fn create_with_schedule(&self, loan: &Loan) -> Result<(), StoreError> {
        if lock(&self.faults).fail_schedule_writes {
            return Err(StoreError::Backend("schedule write rejected".to_string()));
        }

        let mut state = lock(&self.state);
        if state.loans.contains_key(&loan.id) {
            return Err(StoreError::Backend(format!("duplicate loan id {}", loan.id)));
        }
        for payment in &loan.payments {
            state.payments.insert(payment.id, payment.clone());
        }
        state.loans.insert(
            loan.id,
            Loan {
                payments: Vec::new(),
                ..loan.clone()
            },
        );
        Ok(())
    }

    async fn get(&self, id: LoanId) -> Result<Loan, StoreError> {
        lock(&self.state)
            .loans
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn discard(&self, id: LoanId) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.loans.remove(&id).ok_or(StoreError::NotFound)?;
        state.payments.retain(|_, p| p.loan_id != id);
        Ok(())
    }
}

impl ScheduleStore for InMemoryLoanStore {
    async fn get_by_loan(&self, loan_id: LoanId) -> Result<Vec<ScheduledPayment>, StoreError> {
        let mut payments: Vec<_> = lock(&self.state)
            .payments
            .values()
            .filter(|p| p.loan_id == loan_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.due_date);
        Ok(payments)
    }

    async fn get_overdue(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPayment>, StoreError> {
        if lock(&self.faults).fail_overdue_query {
            return Err(StoreError::Backend("overdue query rejected".to_string()));
        }
        Ok(lock(&self.state)
            .payments
            .values()
            .filter(|p| p.can_become_overdue(now))
            .cloned()
            .collect())
    }

    async fn mark_overdue(&self, id: PaymentId) -> Result<bool, StoreError> {
        if lock(&self.faults).failing_updates.contains(&id) {
            return Err(StoreError::Backend("status update rejected".to_string()));
        }

        let mut state = lock(&self.state);
        let payment = state.payments.get_mut(&id).ok_or(StoreError::NotFound)?;
        if payment.status != PaymentStatus::New || payment.is_paid {
            return Ok(false);
        }
        payment.status = PaymentStatus::Overdue;
        Ok(true)
    }
}
