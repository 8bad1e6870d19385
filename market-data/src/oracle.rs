//! Price oracle abstraction and a static in-process implementation

use std::time::Duration;

use async_trait::async_trait;
use common::decimal::Price;
use common::model::market::Quote;
use common::model::order::normalize_symbol;
use dashmap::DashMap;
use tracing::{debug, warn};

/// Source of current prices.
///
/// Implementations must not fail for unknown symbols; they return `None`
/// instead. Calls may block on network I/O.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Current price of `symbol`, or `None` if it cannot be priced
    async fn quote(&self, symbol: &str) -> Option<Price>;
}

/// Fetch a fresh quote, bounded by `timeout`.
///
/// A timeout or a non-positive price both yield an unavailable quote.
/// Vendors commonly report `0` for symbols they do not know.
pub async fn fetch_quote(oracle: &dyn PriceOracle, symbol: &str, timeout: Duration) -> Quote {
    match tokio::time::timeout(timeout, oracle.quote(symbol)).await {
        Ok(Some(price)) if price > Price::ZERO => {
            debug!("Quoted {} at {}", symbol, price);
            Quote::available(symbol.to_string(), price)
        }
        Ok(Some(price)) => {
            debug!("Discarding non-positive price {} for {}", price, symbol);
            Quote::unavailable(symbol.to_string())
        }
        Ok(None) => {
            debug!("No price available for {}", symbol);
            Quote::unavailable(symbol.to_string())
        }
        Err(_) => {
            warn!("Quote for {} timed out after {:?}", symbol, timeout);
            Quote::unavailable(symbol.to_string())
        }
    }
}

/// Oracle serving prices from an in-process table
#[derive(Debug, Default)]
pub struct StaticPriceOracle {
    /// Prices by normalized symbol
    prices: DashMap<String, Price>,
}

impl StaticPriceOracle {
    /// Create an empty oracle
    pub fn new() -> Self {
        Self {
            prices: DashMap::new(),
        }
    }

    /// Create an oracle preloaded with prices
    pub fn with_prices<I, S>(prices: I) -> Self
    where
        I: IntoIterator<Item = (S, Price)>,
        S: AsRef<str>,
    {
        let oracle = Self::new();
        for (symbol, price) in prices {
            oracle.set_price(symbol.as_ref(), price);
        }
        oracle
    }

    /// Set or replace the price of a symbol
    pub fn set_price(&self, symbol: &str, price: Price) {
        if let Ok(symbol) = normalize_symbol(symbol) {
            self.prices.insert(symbol, price);
        }
    }

    /// Stop quoting a symbol
    pub fn remove_price(&self, symbol: &str) -> Option<Price> {
        let symbol = normalize_symbol(symbol).ok()?;
        self.prices.remove(&symbol).map(|(_, price)| price)
    }
}

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn quote(&self, symbol: &str) -> Option<Price> {
        let symbol = normalize_symbol(symbol).ok()?;
        self.prices.get(&symbol).map(|p| *p)
    }
}
