//! `SeaORM` active enums backed by constrained VARCHAR columns.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Value of `transactions.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
pub enum TransactionType {
    /// Deposit.
    #[sea_orm(string_value = "deposit")]
    Deposit,
    /// Withdrawal.
    #[sea_orm(string_value = "withdrawal")]
    Withdrawal,
    /// Transfer.
    #[sea_orm(string_value = "transfer")]
    Transfer,
    /// Card payment.
    #[sea_orm(string_value = "payment")]
    Payment,
    /// Loan credit.
    #[sea_orm(string_value = "loan")]
    Loan,
}

/// Value of `payments.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
pub enum PaymentStatus {
    /// Not yet settled or flagged.
    #[sea_orm(string_value = "new")]
    New,
    /// Settled.
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Past due.
    #[sea_orm(string_value = "overdue")]
    Overdue,
}
