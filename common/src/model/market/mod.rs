//! Market price models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Price;
use crate::model::order::Symbol;

/// Point-in-time price for a symbol.
///
/// `price` is `None` when the oracle could not supply one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Stock symbol
    pub symbol: Symbol,
    /// Last price, if available
    pub price: Option<Price>,
    /// When the quote was taken
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    /// Quote with a usable price
    pub fn available(symbol: Symbol, price: Price) -> Self {
        Self {
            symbol,
            price: Some(price),
            fetched_at: Utc::now(),
        }
    }

    /// Quote for a symbol the oracle could not price
    pub fn unavailable(symbol: Symbol) -> Self {
        Self {
            symbol,
            price: None,
            fetched_at: Utc::now(),
        }
    }

    /// Whether a price was supplied
    pub fn is_available(&self) -> bool {
        self.price.is_some()
    }
}
