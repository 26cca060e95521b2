//! Loan error types.

use kassa_shared::AppError;
use kassa_shared::types::LoanId;
use thiserror::Error;

use crate::amortization::AmortizationError;
use crate::ledger::LedgerError;

/// Errors that can occur during loan operations.
#[derive(Debug, Error)]
pub enum LoanError {
    /// Application failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Loan not found.
    #[error("Loan not found: {0}")]
    LoanNotFound(LoanId),

    /// Caller does not own the loan.
    #[error("Caller does not own loan {0}")]
    Unauthorized(LoanId),

    /// The base rate could not be obtained.
    #[error("Interest rate unavailable: {0}")]
    RateUnavailable(String),

    /// Schedule generation failed.
    #[error(transparent)]
    Amortization(#[from] AmortizationError),

    /// The ledger rejected the account check or the credit.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Storage failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LoanError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::LoanNotFound(_) => "LOAN_NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::RateUnavailable(_) => "RATE_UNAVAILABLE",
            Self::Amortization(e) => e.error_code(),
            Self::Ledger(e) => e.error_code(),
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Unauthorized(_) => 403,
            Self::LoanNotFound(_) => 404,
            Self::RateUnavailable(_) => 503,
            Self::Amortization(e) => e.http_status_code(),
            Self::Ledger(e) => e.http_status_code(),
            Self::Storage(_) => 500,
        }
    }

    /// Returns true if repeating the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::RateUnavailable(_) => true,
            Self::Ledger(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<LoanError> for AppError {
    fn from(err: LoanError) -> Self {
        match err {
            LoanError::Ledger(e) => e.into(),
            LoanError::InvalidInput(_) | LoanError::Amortization(_) => {
                Self::Validation(err.to_string())
            }
            LoanError::LoanNotFound(_) => Self::NotFound(err.to_string()),
            LoanError::Unauthorized(_) => Self::Forbidden(err.to_string()),
            LoanError::RateUnavailable(_) => Self::ExternalService(err.to_string()),
            LoanError::Storage(_) => Self::Database(err.to_string()),
        }
    }
}
