//! Account models and related types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Amount, Quantity};
use crate::model::order::{Symbol, UserId};

/// Account model: a user's cash balance plus stock holdings.
///
/// Holdings never contain a zero quantity; an entry is removed as soon as
/// its last share is sold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Owning user
    pub user_id: UserId,
    /// Cash balance
    pub balance: Amount,
    /// Shares held per symbol
    pub holdings: BTreeMap<Symbol, Quantity>,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with no holdings
    pub fn new(user_id: impl Into<UserId>, balance: Amount) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            balance,
            holdings: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Shares held for a symbol, zero if none
    pub fn shares(&self, symbol: &str) -> Quantity {
        self.holdings.get(symbol).copied().unwrap_or(0)
    }

    /// Add cash to the balance
    pub fn credit(&mut self, amount: Amount) -> Result<(), String> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| format!("balance {} cannot absorb {}", self.balance, amount))?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Remove cash from the balance
    pub fn debit(&mut self, amount: Amount) -> Result<(), String> {
        if amount > self.balance {
            return Err(format!("balance {} does not cover {}", self.balance, amount));
        }

        self.balance -= amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Add shares of a symbol, inserting the holding if absent
    pub fn add_shares(&mut self, symbol: &str, quantity: Quantity) -> Result<(), String> {
        let held = self.shares(symbol);
        let total = held
            .checked_add(quantity)
            .ok_or_else(|| format!("holding of {} would overflow", symbol))?;

        if total > 0 {
            self.holdings.insert(symbol.to_string(), total);
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Remove shares of a symbol, dropping the holding when it reaches zero
    pub fn remove_shares(&mut self, symbol: &str, quantity: Quantity) -> Result<(), String> {
        let held = self.shares(symbol);
        if quantity > held {
            return Err(format!("holding {} {} does not cover {}", held, symbol, quantity));
        }

        let remaining = held - quantity;
        if remaining == 0 {
            self.holdings.remove(symbol);
        } else {
            self.holdings.insert(symbol.to_string(), remaining);
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}
