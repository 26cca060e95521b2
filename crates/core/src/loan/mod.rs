//! Loan issuance.
//!
//! A loan is priced from an external base rate, amortized into a monthly
//! schedule, persisted together with that schedule and finally credited to
//! the borrower's account through the ledger.

pub mod error;
pub mod rate;
pub mod service;
pub mod store;
pub mod types;


pub use error::LoanError;
pub use rate::{FixedRateSource, RateSource};
pub use service::LoanIssuer;
pub use store::{LoanStore, ScheduleStore};
pub use types::{Loan, LoanApplication, PaymentStatus, ScheduledPayment};
