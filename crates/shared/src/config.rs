//! Application configuration management.

use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Periodic job configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Ledger posting rules.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// IBANs of the fund's own bank accounts.
    pub bank_accounts: BankAccountsConfig,
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

/// Scheduling and lease settings for one periodic job.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct JobScheduleConfig {
    /// Seconds between runs.
    pub interval_secs: u64,
    /// Upper bound of the lock lease, in seconds.
    pub lock_at_most_secs: u64,
    /// Lower bound of the lock lease, in seconds.
    pub lock_at_least_secs: u64,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Identity written into lock rows (usually the host name).
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
    /// Directory polled for incoming camt statement files.
    #[serde(default = "default_statement_dir")]
    pub statement_dir: PathBuf,
    /// Statement ingestion followed by return matching.
    #[serde(default = "default_statement_job")]
    pub statement_job: JobScheduleConfig,
    /// Capital transfer contract sweep.
    #[serde(default = "default_capital_transfer_job")]
    pub capital_transfer_job: JobScheduleConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            instance_id: default_instance_id(),
            statement_dir: default_statement_dir(),
            statement_job: default_statement_job(),
            capital_transfer_job: default_capital_transfer_job(),
        }
    }
}

fn default_instance_id() -> String {
    "pillar-worker".to_string()
}

fn default_statement_dir() -> PathBuf {
    PathBuf::from("var/statements")
}

fn default_statement_job() -> JobScheduleConfig {
    JobScheduleConfig {
        interval_secs: 300,
        lock_at_most_secs: 240,
        lock_at_least_secs: 30,
    }
}

fn default_capital_transfer_job() -> JobScheduleConfig {
    JobScheduleConfig {
        interval_secs: 3600,
        lock_at_most_secs: 1800,
        lock_at_least_secs: 60,
    }
}

/// Ledger posting rules.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Maximum value drift allowed when clamping a transfer to a seller's
    /// exact available units.
    #[serde(default = "default_clamping_tolerance")]
    pub clamping_tolerance: Decimal,
    /// ISO 4217 code of the single settlement currency.
    #[serde(default = "default_settlement_currency")]
    pub settlement_currency: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            clamping_tolerance: default_clamping_tolerance(),
            settlement_currency: default_settlement_currency(),
        }
    }
}

fn default_clamping_tolerance() -> Decimal {
    Decimal::new(2, 2)
}

fn default_settlement_currency() -> String {
    "EUR".to_string()
}

/// IBANs of the fund's own bank accounts, one per channel.
#[derive(Debug, Clone, Deserialize)]
pub struct BankAccountsConfig {
    /// Account receiving member contributions.
    pub deposit_eur: String,
    /// Account paying out withdrawals and returns.
    pub withdrawal_eur: String,
    /// Account settling fund unit trades.
    pub fund_investment_eur: String,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> AppResult<Self> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("PILLAR").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values the type system cannot.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first offending key.
    pub fn validate(&self) -> AppResult<()> {
        if self.ledger.clamping_tolerance.is_sign_negative() {
            return Err(AppError::Config(
                "ledger.clamping_tolerance must not be negative".to_string(),
            ));
        }
        let currency = &self.ledger.settlement_currency;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(AppError::Config(format!(
                "ledger.settlement_currency must be an ISO 4217 code, got {currency}"
            )));
        }

        let accounts = &self.bank_accounts;
        let ibans = [
            &accounts.deposit_eur,
            &accounts.withdrawal_eur,
            &accounts.fund_investment_eur,
        ];
        if ibans.iter().any(|iban| iban.trim().is_empty()) {
            return Err(AppError::Config(
                "bank_accounts entries must not be empty".to_string(),
            ));
        }
        if ibans[0] == ibans[1] || ibans[0] == ibans[2] || ibans[1] == ibans[2] {
            return Err(AppError::Config(
                "bank_accounts must name three distinct IBANs".to_string(),
            ));
        }

        for (name, job) in [
            ("statement_job", self.scheduler.statement_job),
            ("capital_transfer_job", self.scheduler.capital_transfer_job),
        ] {
            if job.lock_at_least_secs > job.lock_at_most_secs {
                return Err(AppError::Config(format!(
                    "scheduler.{name}.lock_at_least_secs exceeds lock_at_most_secs"
                )));
            }
        }
        Ok(())
    }
}
