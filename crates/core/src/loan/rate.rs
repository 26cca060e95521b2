//! Base interest rate sources.

use std::future::Future;

use rust_decimal::Decimal;

use super::error::LoanError;

/// Supplies the current base annual rate in percent.
pub trait RateSource: Send + Sync {
    /// Current base rate.
    fn current_base_rate(&self) -> impl Future<Output = Result<Decimal, LoanError>> + Send;
}

/// A rate source that always returns the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedRateSource {
    rate: Decimal,
}

impl FixedRateSource {
    /// Create a source serving `rate` percent.
    #[must_use]
    pub const fn new(rate: Decimal) -> Self {
        Self { rate }
    }
}

impl RateSource for FixedRateSource {
    async fn current_base_rate(&self) -> Result<Decimal, LoanError> {
        Ok(self.rate)
    }
}
