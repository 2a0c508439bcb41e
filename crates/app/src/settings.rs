//! Handles settings for the application. Configuration is read from
//! `settings.toml` (or the file passed with `--config`) and overridden by
//! `WALLET__SECTION__KEY` environment variables.
//!
//! ```toml
//! [app]
//! level = "info"
//!
//! [server]
//! port = 3000
//! database = { sqlite = "wallet.db" }
//!
//! [rates]
//! url = "http://localhost:8081"
//!
//! [ledger]
//! exchange_mode = "two_phase"
//! ```

use std::{collections::BTreeMap, time::Duration};

use config::{Config, ConfigError, Environment, File};
use engine::{ExchangeMode, RetryPolicy};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    /// Path of the database file, created when missing.
    Sqlite(String),
    /// Connection url.
    Postgres(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Rates {
    /// Base url of the rate service.
    pub url: Option<String>,
    pub timeout_ms: u64,
    /// Fixed table against USD, used instead of the rate service. Codes are
    /// case-insensitive.
    pub fixed: Option<BTreeMap<String, Decimal>>,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: 5000,
            fixed: None,
        }
    }
}

impl Rates {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeModeSetting {
    #[default]
    Atomic,
    TwoPhase,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ledger {
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub exchange_mode: ExchangeModeSetting,
    /// Credit tries of a two-phase exchange.
    pub credit_attempts: u32,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_backoff_ms: 50,
            exchange_mode: ExchangeModeSetting::Atomic,
            credit_attempts: 3,
        }
    }
}

impl Ledger {
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn exchange_mode(&self) -> ExchangeMode {
        match self.exchange_mode {
            ExchangeModeSetting::Atomic => ExchangeMode::Atomic,
            ExchangeModeSetting::TwoPhase => ExchangeMode::TwoPhase {
                credit_attempts: self.credit_attempts,
                backoff: Duration::from_millis(self.retry_backoff_ms),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Server,
    #[serde(default)]
    pub rates: Rates,
    #[serde(default)]
    pub ledger: Ledger,
}

impl Settings {
    /// Without `path`, `settings.toml` in the working directory is read when
    /// present.
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::with_name(path),
            None => File::with_name("settings").required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("WALLET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
