//! Configuration for the account service

use std::env;
use std::time::Duration;

use common::decimal::{dec, Amount};
use common::error::{Error, Result};

/// Default sell fee rate (0.8% of gross proceeds)
pub const DEFAULT_SELL_FEE_RATE: Amount = dec!(0.008);

/// Default upper bound on a single price-oracle call
pub const DEFAULT_QUOTE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Configuration for the account service
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Database URL; `None` keeps accounts in memory
    pub database_url: Option<String>,
    /// Database connection pool size
    pub db_pool_size: u32,
    /// Log every committed ledger mutation
    pub transaction_logging: bool,
    /// Maximum time to wait for a quote
    pub quote_timeout: Duration,
    /// Fraction of gross sale proceeds withheld as a fee
    pub sell_fee_rate: Amount,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_pool_size: 5,
            transaction_logging: false,
            quote_timeout: DEFAULT_QUOTE_TIMEOUT,
            sell_fee_rate: DEFAULT_SELL_FEE_RATE,
        }
    }
}

impl LedgerConfig {
    /// Create a new configuration using environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let sell_fee_rate = match env::var("SELL_FEE_RATE") {
            Ok(raw) => raw.trim().parse::<Amount>().map_err(|e| {
                Error::ConfigurationError(format!("SELL_FEE_RATE {:?} is not a decimal: {}", raw, e))
            })?,
            Err(_) => defaults.sell_fee_rate,
        };

        let config = Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            db_pool_size: env::var("DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.db_pool_size),
            transaction_logging: env::var("TRANSACTION_LOGGING")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.transaction_logging),
            quote_timeout: env::var("QUOTE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.quote_timeout),
            sell_fee_rate,
        };

        config.validate()?;
        Ok(config)
    }

    /// In-memory configuration with default trading parameters
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Override the sell fee rate
    pub fn with_sell_fee_rate(mut self, rate: Amount) -> Self {
        self.sell_fee_rate = rate;
        self
    }

    /// Override the quote timeout
    pub fn with_quote_timeout(mut self, timeout: Duration) -> Self {
        self.quote_timeout = timeout;
        self
    }

    /// Check that the trading parameters are usable
    pub fn validate(&self) -> Result<()> {
        if self.sell_fee_rate < Amount::ZERO || self.sell_fee_rate >= Amount::ONE {
            return Err(Error::ConfigurationError(format!(
                "Sell fee rate must be in [0, 1), got {}",
                self.sell_fee_rate
            )));
        }

        if self.quote_timeout.is_zero() {
            return Err(Error::ConfigurationError("Quote timeout must be positive".to_string()));
        }

        if self.db_pool_size == 0 {
            return Err(Error::ConfigurationError("Database pool size must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sell_fee_rate, dec!(0.008));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_rejects_out_of_range_fee() {
        let config = LedgerConfig::default().with_sell_fee_rate(dec!(1));
        assert!(matches!(config.validate(), Err(Error::ConfigurationError(_))));

        let config = LedgerConfig::default().with_sell_fee_rate(dec!(-0.01));
        assert!(matches!(config.validate(), Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = LedgerConfig::default().with_quote_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
