//! Overdue payment detection.
//!
//! A single long-lived task that periodically moves lapsed, unpaid
//! scheduled payments from `new` to `overdue`.

pub mod scheduler;

pub use scheduler::{OverdueScheduler, ScanReport};
