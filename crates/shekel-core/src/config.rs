//! Configuration types for Shekel Streamer components.

use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::error::AppError;

/// Timezone used when no `DEFAULT_TIMEZONE` is configured.
pub const DEFAULT_TIMEZONE: &str = "Asia/Jerusalem";

/// Parses an IANA timezone name such as `Asia/Jerusalem`.
pub fn parse_timezone(name: &str) -> Result<Tz, AppError> {
    Tz::from_str(name.trim())
        .map_err(|_| AppError::ConfigError(format!("Unknown timezone: '{}'", name)))
}

/// Database connection pool configuration.
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

/// HTTP client configuration for external API calls.
pub struct HttpConfig {
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Per-run reconciliation settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How many days back the scraping session starts.
    pub lookback_days: i64,
    /// Maximum number of transactions per translation batch.
    pub chunk_size: usize,
    /// Timezone used to render dates in notifications.
    pub timezone: Tz,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            chunk_size: 30,
            timezone: chrono_tz::Asia::Jerusalem,
        }
    }
}

impl SyncConfig {
    /// Creates a new SyncConfig with a custom lookback window.
    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback_days = days.max(0);
        self
    }

    /// Creates a new SyncConfig with a custom chunk size (never below 1).
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }
}

/// Names of the two tables the pipeline writes to.
///
/// Names are interpolated into SQL, so they are restricted to plain
/// identifiers: a letter or underscore followed by letters, digits or
/// underscores, at most 63 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    transactions: String,
    translations: String,
}

impl TableNames {
    pub fn new(transactions: &str, translations: &str) -> Result<Self, AppError> {
        validate_identifier(transactions)?;
        validate_identifier(translations)?;
        if transactions == translations {
            return Err(AppError::ConfigError(format!(
                "Transactions and translations tables must differ (both '{}')",
                transactions
            )));
        }
        Ok(Self {
            transactions: transactions.to_string(),
            translations: translations.to_string(),
        })
    }

    pub fn transactions(&self) -> &str {
        &self.transactions
    }

    pub fn translations(&self) -> &str {
        &self.translations
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            transactions: "transactions".to_string(),
            translations: "translations".to_string(),
        }
    }
}

fn validate_identifier(name: &str) -> Result<(), AppError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && name.len() <= 63 {
        Ok(())
    } else {
        Err(AppError::ConfigError(format!(
            "Invalid table name: '{}'",
            name
        )))
    }
}
