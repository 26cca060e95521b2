//! Core business logic for Kassa.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Storage is reached through the traits declared next to each service; the
//! `db` crate implements them for PostgreSQL and [`memory`] implements them
//! in-process.
//!
//! # Modules
//!
//! - `ledger` - Balance mutation, transfers and the transaction log
//! - `amortization` - Loan repayment schedule generation
//! - `loan` - Loan issuance on top of the ledger
//! - `overdue` - Background reclassification of lapsed payments
//! - `clock` - Injectable time source

pub mod amortization;
pub mod clock;
pub mod ledger;
pub mod loan;
pub mod memory;
pub mod overdue;
