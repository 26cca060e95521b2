//! Loan issuer service.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use kassa_shared::Caller;
use kassa_shared::config::{LedgerConfig, LoanConfig};
use kassa_shared::types::{LoanId, TransactionId};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use super::error::LoanError;
use super::rate::RateSource;
use super::store::{LoanStore, ScheduleStore};
use super::types::{Loan, LoanApplication, ScheduledPayment};
use crate::amortization::{LoanTerms, generate_schedule};
use crate::ledger::{
    AdjustBalanceInput, BalanceStore, Ledger, LedgerError, StoreError, TransactionKind,
    TransactionLog, with_deadline,
};

/// Issues loans and serves their schedules.
pub struct LoanIssuer<B, T, L, S, R>
where
    B: BalanceStore,
    T: TransactionLog,
    L: LoanStore,
    S: ScheduleStore,
    R: RateSource,
{
    ledger: Arc<Ledger<B, T>>,
    loans: Arc<L>,
    schedules: Arc<S>,
    rates: Arc<R>,
    rate_markup: Decimal,
    timeout: Duration,
}

impl<B, T, L, S, R> LoanIssuer<B, T, L, S, R>
where
    B: BalanceStore,
    T: TransactionLog,
    L: LoanStore,
    S: ScheduleStore,
    R: RateSource,
{
    /// Create a new loan issuer.
    #[must_use]
    pub fn new(
        ledger: Arc<Ledger<B, T>>,
        loans: Arc<L>,
        schedules: Arc<S>,
        rates: Arc<R>,
        loan_config: &LoanConfig,
        ledger_config: &LedgerConfig,
    ) -> Self {
        Self {
            ledger,
            loans,
            schedules,
            rates,
            rate_markup: loan_config.rate_markup,
            timeout: Duration::from_millis(ledger_config.operation_timeout_ms),
        }
    }

    /// Issue a loan into one of the caller's accounts.
    ///
    /// The loan and its schedule are persisted as one unit before the
    /// principal is credited. If the credit fails the loan is discarded
    /// again and the credit error is returned. A credit that timed out is
    /// looked up by its entry id first; if it landed the loan stands.
    pub async fn apply(
        &self,
        caller: &Caller,
        application: LoanApplication,
    ) -> Result<Loan, LoanError> {
        if !application.amount.is_positive() {
            return Err(LoanError::InvalidInput(
                "loan amount must be positive".to_string(),
            ));
        }
        if application.term_months == 0 {
            return Err(LoanError::InvalidInput(
                "loan term must be at least one month".to_string(),
            ));
        }

        let account = self
            .ledger
            .get_account(caller, application.account_id)
            .await?;

        let base_rate = tokio::time::timeout(self.timeout, self.rates.current_base_rate())
            .await
            .map_err(|_| LoanError::RateUnavailable("rate source timed out".to_string()))?
            .inspect_err(|e| error!(error = %e, "Failed to get base rate"))?;
        let interest_rate = base_rate
            .checked_mul(self.rate_markup)
            .ok_or_else(|| LoanError::InvalidInput("interest rate out of range".to_string()))?;

        let loan_id = LoanId::new();
        let start_date = Utc::now();
        let payments = generate_schedule(&LoanTerms {
            loan_id,
            principal: application.amount,
            annual_rate_percent: interest_rate,
            term_months: application.term_months,
            start_date,
        })?;

        let loan = Loan {
            id: loan_id,
            user_id: caller.user_id,
            account_id: account.id,
            amount: application.amount,
            interest_rate,
            term: application.term_months,
            start_date,
            debt: application.amount,
            payments,
        };

        with_deadline(
            self.timeout,
            "create loan",
            self.loans.create_with_schedule(&loan),
        )
        .await
        .map_err(|e| {
            error!(loan_id = %loan_id, error = %e, "Failed to persist loan");
            LoanError::Storage(e.to_string())
        })?;

        let transaction_id = TransactionId::new();
        let credit = self
            .ledger
            .adjust_balance_with_id(
                caller,
                AdjustBalanceInput {
                    account_id: account.id,
                    amount: application.amount,
                    kind: TransactionKind::Loan,
                    description: format!("Loan {loan_id}"),
                },
                transaction_id,
            )
            .await;

        match credit {
            Ok(_) => {}
            Err(LedgerError::Timeout(operation)) => {
                self.resolve_timed_out_credit(caller, &loan, transaction_id, operation)
                    .await?;
            }
            Err(e) => {
                error!(loan_id = %loan_id, error = %e, "Loan credit failed, discarding loan");
                self.discard(loan_id).await;
                return Err(e.into());
            }
        }

        info!(
            loan_id = %loan_id,
            account_id = %account.id,
            amount = %loan.amount,
            interest_rate = %loan.interest_rate,
            term = loan.term,
            "Loan issued"
        );
        Ok(loan)
    }

    /// Fetch one of the caller's loans with its schedule.
    pub async fn get_loan(&self, caller: &Caller, loan_id: LoanId) -> Result<Loan, LoanError> {
        let mut loan = self.load_owned(caller, loan_id).await?;
        loan.payments = self.fetch_schedule(loan_id).await?;
        Ok(loan)
    }

    /// Repayment schedule of one of the caller's loans, ordered by due date.
    pub async fn schedule(
        &self,
        caller: &Caller,
        loan_id: LoanId,
    ) -> Result<Vec<ScheduledPayment>, LoanError> {
        self.load_owned(caller, loan_id).await?;
        self.fetch_schedule(loan_id).await
    }

    /// Decide the fate of a loan whose credit timed out.
    ///
    /// The credit may have been committed, so the loan is kept unless its
    /// ledger entry is confirmed absent.
    async fn resolve_timed_out_credit(
        &self,
        caller: &Caller,
        loan: &Loan,
        transaction_id: TransactionId,
        operation: &'static str,
    ) -> Result<(), LoanError> {
        match self
            .ledger
            .find_transaction(caller, loan.account_id, transaction_id)
            .await
        {
            Ok(Some(_)) => {
                warn!(loan_id = %loan.id, transaction_id = %transaction_id, "Loan credit timed out but was recorded");
                Ok(())
            }
            Ok(None) => {
                error!(loan_id = %loan.id, operation, "Loan credit timed out before commit, discarding loan");
                self.discard(loan.id).await;
                Err(LedgerError::Timeout(operation).into())
            }
            Err(e) => {
                error!(
                    loan_id = %loan.id,
                    transaction_id = %transaction_id,
                    error = %e,
                    "Cannot confirm loan credit, keeping loan"
                );
                Err(LedgerError::Timeout(operation).into())
            }
        }
    }

    async fn discard(&self, loan_id: LoanId) {
        if let Err(e) =
            with_deadline(self.timeout, "discard loan", self.loans.discard(loan_id)).await
        {
            error!(loan_id = %loan_id, error = %e, "Failed to discard loan after credit failure");
        }
    }

    async fn load_owned(&self, caller: &Caller, loan_id: LoanId) -> Result<Loan, LoanError> {
        let loan = with_deadline(self.timeout, "get loan", self.loans.get(loan_id))
            .await
            .map_err(|e| match e {
                StoreError::NotFound => LoanError::LoanNotFound(loan_id),
                other => {
                    error!(loan_id = %loan_id, error = %other, "Failed to load loan");
                    LoanError::Storage(other.to_string())
                }
            })?;

        if !caller.owns(loan.user_id) {
            warn!(loan_id = %loan_id, caller = %caller.user_id, "Caller does not own loan");
            return Err(LoanError::Unauthorized(loan_id));
        }
        Ok(loan)
    }

    async fn fetch_schedule(&self, loan_id: LoanId) -> Result<Vec<ScheduledPayment>, LoanError> {
        let mut payments = with_deadline(
            self.timeout,
            "get schedule",
            self.schedules.get_by_loan(loan_id),
        )
        .await
        .map_err(|e| {
            error!(loan_id = %loan_id, error = %e, "Failed to load schedule");
            LoanError::Storage(e.to_string())
        })?;
        payments.sort_by_key(|p| p.due_date);
        Ok(payments)
    }
}
