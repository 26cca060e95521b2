//! Ledger error types.

use kassa_shared::AppError;
use kassa_shared::types::{AccountId, Money};
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Input failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Amount cannot be zero.
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Amount cannot be negative.
    #[error("Amount cannot be negative")]
    NegativeAmount,

    // ========== Account Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Caller does not own the account.
    #[error("Caller does not own account {0}")]
    Unauthorized(AccountId),

    /// Account still holds money and cannot be closed.
    #[error("Account {account_id} still holds {balance}")]
    AccountNotEmpty {
        /// The account.
        account_id: AccountId,
        /// Its balance in minor units.
        balance: Money,
    },

    // ========== Balance Errors ==========
    /// Balance is lower than the amount requested.
    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Balance at the time of the check.
        available: Money,
        /// Amount requested.
        requested: Money,
    },

    /// Balance would leave the representable range.
    #[error("Balance overflow on account {0}")]
    BalanceOverflow(AccountId),

    /// Balance kept changing underneath the adjustment.
    #[error("Account {0} was modified concurrently")]
    ConcurrentModification(AccountId),

    // ========== Storage Errors ==========
    /// A storage call did not finish in time. The write may or may not
    /// have been committed, so this is not retryable.
    #[error("Storage operation timed out: {0}")]
    Timeout(&'static str),

    /// Storage failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::AccountNotEmpty { .. } => "ACCOUNT_NOT_EMPTY",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::BalanceOverflow(_) => "BALANCE_OVERFLOW",
            Self::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            Self::Timeout(_) => "TIMEOUT",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::ZeroAmount | Self::NegativeAmount => 400,
            Self::Unauthorized(_) => 403,
            Self::AccountNotFound(_) => 404,
            Self::ConcurrentModification(_) | Self::AccountNotEmpty { .. } => 409,
            Self::InsufficientFunds { .. } | Self::BalanceOverflow(_) => 422,
            Self::Timeout(_) => 504,
            Self::Storage(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if repeating the same call is safe and may succeed.
    ///
    /// Only errors raised before anything was written qualify.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::InvalidInput(_) | LedgerError::ZeroAmount | LedgerError::NegativeAmount => {
                Self::Validation(message)
            }
            LedgerError::Unauthorized(_) => Self::Forbidden(message),
            LedgerError::AccountNotFound(_) => Self::NotFound(message),
            LedgerError::AccountNotEmpty { .. }
            | LedgerError::InsufficientFunds { .. }
            | LedgerError::BalanceOverflow(_) => Self::BusinessRule(message),
            LedgerError::ConcurrentModification(_) => Self::Conflict(message),
            LedgerError::Timeout(_) | LedgerError::Storage(_) => Self::Database(message),
            LedgerError::Internal(_) => Self::Internal(message),
        }
    }
}
