//! Portfolio valuation: read-only net worth over the ledger

use std::sync::Arc;
use std::time::Duration;

use common::decimal::{notional, Amount, Price, Quantity};
use common::error::Result;
use common::model::account::Account;
use common::model::order::{Symbol, UserId};
use futures::future::join_all;
use market_data::oracle::fetch_quote;
use market_data::PriceOracle;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LedgerConfig;
use crate::store::LedgerStore;

/// Value of one holding line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingValuation {
    pub symbol: Symbol,
    pub quantity: Quantity,
    /// `None` when no price could be obtained
    pub current_price: Option<Price>,
    /// `None` when no price could be obtained or the value is out of range
    pub total_value: Option<Amount>,
}

/// Net worth of one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub user_id: UserId,
    pub balance: Amount,
    /// Sum over holdings with a line value
    pub total_stock_value: Amount,
    /// `balance + total_stock_value`
    pub net_value: Amount,
    pub holdings: Vec<HoldingValuation>,
}

impl PortfolioValuation {
    /// Symbols left out of the total
    pub fn unpriced_symbols(&self) -> Vec<&str> {
        self.holdings
            .iter()
            .filter(|h| h.total_value.is_none())
            .map(|h| h.symbol.as_str())
            .collect()
    }
}

/// Computes net worth from ledger state and fresh quotes; never mutates holdings
pub struct PortfolioValuator {
    store: Arc<LedgerStore>,
    oracle: Arc<dyn PriceOracle>,
    quote_timeout: Duration,
}

impl PortfolioValuator {
    pub fn new(store: Arc<LedgerStore>, oracle: Arc<dyn PriceOracle>) -> Self {
        Self::with_config(store, oracle, &LedgerConfig::default())
    }

    pub fn with_config(store: Arc<LedgerStore>, oracle: Arc<dyn PriceOracle>, config: &LedgerConfig) -> Self {
        Self {
            store,
            oracle,
            quote_timeout: config.quote_timeout,
        }
    }

    /// Net worth of one user.
    ///
    /// A user without an account is provisioned with a zero balance first.
    /// Holdings whose price is unavailable are listed with no value and left
    /// out of the total rather than counted as zero.
    pub async fn net_worth(&self, user_id: &str) -> Result<PortfolioValuation> {
        let account = self.store.get_or_provision(user_id).await?;
        Ok(self.value_account(&account).await)
    }

    /// Net worth of every account, highest first.
    ///
    /// Equal net values keep provisioning order.
    pub async fn all_net_worth(&self) -> Vec<PortfolioValuation> {
        let accounts = self.store.snapshot().await;
        let mut valuations = join_all(accounts.iter().map(|account| self.value_account(account))).await;

        // Vec::sort_by is stable
        valuations.sort_by(|a, b| b.net_value.cmp(&a.net_value));
        valuations
    }

    async fn value_account(&self, account: &Account) -> PortfolioValuation {
        let quotes = join_all(
            account
                .holdings
                .keys()
                .map(|symbol| fetch_quote(self.oracle.as_ref(), symbol, self.quote_timeout)),
        )
        .await;

        let mut total_stock_value = Amount::ZERO;
        let holdings: Vec<HoldingValuation> = account
            .holdings
            .iter()
            .zip(quotes)
            .map(|((symbol, quantity), quote)| {
                let total_value = quote.price.and_then(|price| {
                    let value = notional(price, *quantity)?;
                    let total = total_stock_value.checked_add(value)?;
                    account.balance.checked_add(total)?;
                    total_stock_value = total;
                    Some(value)
                });
                if quote.price.is_some() && total_value.is_none() {
                    warn!("Value of {} {} for {} is out of range", quantity, symbol, account.user_id);
                }
                HoldingValuation {
                    symbol: symbol.clone(),
                    quantity: *quantity,
                    current_price: quote.price,
                    total_value,
                }
            })
            .collect();

        debug!(
            "Valued {}: balance {}, stocks {}",
            account.user_id, account.balance, total_stock_value
        );

        PortfolioValuation {
            user_id: account.user_id.clone(),
            balance: account.balance,
            total_stock_value,
            net_value: account.balance + total_stock_value,
            holdings,
        }
    }
}
