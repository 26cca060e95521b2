//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger behaviour.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Loan pricing.
    #[serde(default)]
    pub loans: LoanConfig,
    /// Background scheduler.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// How many times a single-account adjustment is retried after losing
    /// a compare-and-set race.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Upper bound for a single storage call, in milliseconds.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_operation_timeout_ms() -> u64 {
    5_000
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

/// Loan pricing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoanConfig {
    /// Base annual rate in percent served by the fixed rate source.
    #[serde(default = "default_base_rate")]
    pub base_rate: Decimal,
    /// Multiplier applied to the base rate to price a loan.
    #[serde(default = "default_rate_markup")]
    pub rate_markup: Decimal,
}

fn default_base_rate() -> Decimal {
    Decimal::new(160, 1) // 16.0%
}

fn default_rate_markup() -> Decimal {
    Decimal::new(11, 1) // 1.1
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            base_rate: default_base_rate(),
            rate_markup: default_rate_markup(),
        }
    }
}

/// Background scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the overdue payment checker runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Seconds between overdue scans.
    #[serde(default = "default_overdue_interval")]
    pub overdue_interval_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_overdue_interval() -> u64 {
    43_200 // 12 hours
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            overdue_interval_secs: default_overdue_interval(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("KASSA").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would make the system misbehave.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first invalid value.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.scheduler.overdue_interval_secs == 0 {
            return Err(config::ConfigError::Message(
                "scheduler.overdue_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.ledger.operation_timeout_ms == 0 {
            return Err(config::ConfigError::Message(
                "ledger.operation_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.loans.base_rate.is_sign_negative() {
            return Err(config::ConfigError::Message(
                "loans.base_rate must not be negative".to_string(),
            ));
        }
        if self.loans.rate_markup <= Decimal::ZERO {
            return Err(config::ConfigError::Message(
                "loans.rate_markup must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
