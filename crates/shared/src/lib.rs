//! Shared types, errors, and configuration for Kassa.
//!
//! This crate provides common types used across all other crates:
//! - Money in integer minor units
//! - Typed IDs for type-safe entity references
//! - The authenticated caller identity
//! - Application-wide error types
//! - Configuration management

pub mod auth;
pub mod config;
pub mod error;
pub mod types;

pub use auth::Caller;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
