//! Loan domain types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use kassa_shared::types::{AccountId, LoanId, Money, PaymentId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LoanError;

/// Lifecycle state of a scheduled payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Not yet due or not yet flagged.
    New,
    /// Settled.
    Paid,
    /// Due date passed without settlement.
    Overdue,
}

impl PaymentStatus {
    /// Returns the database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = LoanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "paid" => Ok(Self::Paid),
            "overdue" => Ok(Self::Overdue),
            other => Err(LoanError::InvalidInput(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// One row of a loan repayment schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledPayment {
    /// Payment ID.
    pub id: PaymentId,
    /// Owning loan.
    pub loan_id: LoanId,
    /// Amount due, principal plus interest.
    pub amount: Money,
    /// When the payment was settled.
    pub paid_date: Option<DateTime<Utc>>,
    /// When the payment falls due.
    pub due_date: DateTime<Utc>,
    /// Principal portion of `amount`.
    pub principal_part: Money,
    /// Interest portion of `amount`.
    pub interest_part: Money,
    /// Lifecycle state.
    pub status: PaymentStatus,
    /// Settlement flag.
    pub is_paid: bool,
}

impl ScheduledPayment {
    /// Returns true if the payment is unpaid, still `new` and past due.
    #[must_use]
    pub fn can_become_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::New && !self.is_paid && self.due_date < now
    }
}

/// A loan together with its repayment schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// Loan ID.
    pub id: LoanId,
    /// Borrower.
    pub user_id: UserId,
    /// Account the principal was credited to.
    pub account_id: AccountId,
    /// Principal in minor units.
    pub amount: Money,
    /// Annual interest rate in percent.
    pub interest_rate: Decimal,
    /// Term in months.
    pub term: u32,
    /// Issue time; due dates count from here.
    pub start_date: DateTime<Utc>,
    /// Outstanding debt. Set to the principal at issue.
    pub debt: Money,
    /// Repayment schedule ordered by due date.
    pub payments: Vec<ScheduledPayment>,
}

/// Request to borrow money into an account.
#[derive(Debug, Clone)]
pub struct LoanApplication {
    /// Account to credit, must be owned by the caller.
    pub account_id: AccountId,
    /// Principal in minor units.
    pub amount: Money,
    /// Term in months.
    pub term_months: u32,
}
