//! Loan amortization.
//!
//! Turns loan terms into a reducing-balance annuity schedule. Pure
//! computation, no I/O.

pub mod engine;
pub mod error;

#[cfg(test)]
mod engine_props;

pub use engine::{LoanTerms, generate_schedule, monthly_payment, monthly_rate};
pub use error::AmortizationError;
