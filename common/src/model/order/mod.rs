//! Order models and related types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decimal::Quantity;
use crate::error::{Error, Result};

/// User identity an account is keyed by
pub type UserId = String;

/// Case-normalized stock symbol
pub type Symbol = String;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Normalize a raw symbol: trimmed and upper-cased.
///
/// Returns `InvalidOrder` for an empty symbol.
pub fn normalize_symbol(raw: &str) -> Result<Symbol> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(Error::InvalidOrder("Symbol must not be empty".to_string()));
    }
    Ok(symbol)
}

/// Market order executed immediately at the quoted price.
///
/// Orders are ephemeral: they exist only for the duration of one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Account the order trades against
    pub user_id: UserId,
    /// Stock symbol
    pub symbol: Symbol,
    /// Buy or sell
    pub side: Side,
    /// Number of whole shares
    pub quantity: Quantity,
}

impl Order {
    /// Create a new order
    pub fn new(user_id: impl Into<UserId>, symbol: impl Into<Symbol>, side: Side, quantity: Quantity) -> Self {
        Self {
            user_id: user_id.into(),
            symbol: symbol.into(),
            side,
            quantity,
        }
    }

    /// Create a buy order
    pub fn buy(user_id: impl Into<UserId>, symbol: impl Into<Symbol>, quantity: Quantity) -> Self {
        Self::new(user_id, symbol, Side::Buy, quantity)
    }

    /// Create a sell order
    pub fn sell(user_id: impl Into<UserId>, symbol: impl Into<Symbol>, quantity: Quantity) -> Self {
        Self::new(user_id, symbol, Side::Sell, quantity)
    }

    /// Check the order preconditions and normalize its symbol
    pub fn validate(self) -> Result<Self> {
        if self.quantity == 0 {
            return Err(Error::InvalidOrder(format!(
                "Quantity must be positive for {} {}",
                self.side, self.symbol
            )));
        }

        let symbol = normalize_symbol(&self.symbol)?;
        Ok(Self { symbol, ..self })
    }
}
