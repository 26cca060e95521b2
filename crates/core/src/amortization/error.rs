//! Amortization error types.

use thiserror::Error;

/// Errors that can occur while building a schedule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmortizationError {
    /// Loan terms are out of range.
    #[error("Invalid loan terms: {0}")]
    InvalidInput(String),

    /// An intermediate value left the representable range.
    #[error("Arithmetic overflow while computing {0}")]
    Overflow(&'static str),
}

impl AmortizationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_LOAN_TERMS",
            Self::Overflow(_) => "AMORTIZATION_OVERFLOW",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Overflow(_) => 422,
        }
    }
}
