//! Trade engine: market buys and sells against the ledger store
//!
//! Orders execute instantly at the quoted price against an abstract market
//! with unlimited liquidity. The quote is fetched before the account is
//! locked; funds and holdings are then re-validated against the account's
//! current state inside a single store transaction.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::decimal::{notional, precision, Amount, Price, Quantity};
use common::error::{Error, Result};
use common::model::order::{Order, Side, Symbol, UserId};
use market_data::oracle::fetch_quote;
use market_data::PriceOracle;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::store::LedgerStore;

/// Outcome of an executed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReceipt {
    /// Execution ID
    pub id: Uuid,
    /// Account traded
    pub user_id: UserId,
    /// Normalized symbol
    pub symbol: Symbol,
    /// Buy or sell
    pub side: Side,
    /// Shares traded
    pub quantity: Quantity,
    /// Quoted price the order executed at
    pub price: Price,
    /// `price * quantity`
    pub gross: Amount,
    /// Fee withheld (sells only)
    pub fee: Amount,
    /// Cash that left (buy) or entered (sell) the account
    pub net_amount: Amount,
    /// Balance after the trade
    pub balance: Amount,
    /// Full holdings after the trade
    pub holdings: BTreeMap<Symbol, Quantity>,
    /// Execution timestamp
    pub executed_at: DateTime<Utc>,
}

/// Split gross sale proceeds into `(net, fee)`
pub fn sell_proceeds(gross: Amount, fee_rate: Amount) -> (Amount, Amount) {
    let net = precision::round_amount(gross * (Amount::ONE - fee_rate));
    (net, gross - net)
}

/// Trade engine executing orders for single accounts
pub struct TradeEngine {
    store: Arc<LedgerStore>,
    oracle: Arc<dyn PriceOracle>,
    sell_fee_rate: Amount,
    quote_timeout: Duration,
}

impl TradeEngine {
    /// Create a trade engine with the default fee rate and quote timeout
    pub fn new(store: Arc<LedgerStore>, oracle: Arc<dyn PriceOracle>) -> Self {
        Self::with_config(store, oracle, &LedgerConfig::default())
    }

    /// Create a trade engine with trading parameters from a configuration
    pub fn with_config(store: Arc<LedgerStore>, oracle: Arc<dyn PriceOracle>, config: &LedgerConfig) -> Self {
        Self {
            store,
            oracle,
            sell_fee_rate: config.sell_fee_rate,
            quote_timeout: config.quote_timeout,
        }
    }

    /// Fee rate applied to sale proceeds
    pub fn sell_fee_rate(&self) -> Amount {
        self.sell_fee_rate
    }

    /// Buy `quantity` shares of `symbol` for `user_id`
    pub async fn buy(&self, user_id: &str, symbol: &str, quantity: Quantity) -> Result<TradeReceipt> {
        self.execute(Order::buy(user_id, symbol, quantity)).await
    }

    /// Sell `quantity` shares of `symbol` for `user_id`
    pub async fn sell(&self, user_id: &str, symbol: &str, quantity: Quantity) -> Result<TradeReceipt> {
        self.execute(Order::sell(user_id, symbol, quantity)).await
    }

    /// Execute an order.
    ///
    /// Every failure leaves the account untouched.
    pub async fn execute(&self, order: Order) -> Result<TradeReceipt> {
        let order = order.validate()?;
        let price = self.price_for(&order).await?;
        let gross = notional(price, order.quantity).ok_or_else(|| {
            Error::InvalidOrder(format!(
                "Value of {} {} @ {} is out of range",
                order.quantity, order.symbol, price
            ))
        })?;

        let result = match order.side {
            Side::Buy => self.apply_buy(&order, price, gross).await,
            Side::Sell => self.apply_sell(&order, price, gross).await,
        };

        match &result {
            Ok(receipt) => info!(
                "Executed {} {} {} @ {} for {}: balance now {}",
                receipt.side, receipt.quantity, receipt.symbol, receipt.price, receipt.user_id, receipt.balance
            ),
            Err(e) => warn!(
                "Rejected {} {} {} for {}: {}",
                order.side, order.quantity, order.symbol, order.user_id, e
            ),
        }

        result
    }

    /// Quote fetched outside any account lock
    async fn price_for(&self, order: &Order) -> Result<Price> {
        let quote = fetch_quote(self.oracle.as_ref(), &order.symbol, self.quote_timeout).await;
        quote.price.ok_or_else(|| {
            Error::PriceUnavailable(format!("No price available for {}", order.symbol))
        })
    }

    async fn apply_buy(&self, order: &Order, price: Price, cost: Amount) -> Result<TradeReceipt> {
        self.store
            .transact(&order.user_id, |account| {
                account.debit(cost).map_err(|e| {
                    Error::InsufficientFunds(format!(
                        "Cannot buy {} {} for {}: {}",
                        order.quantity, order.symbol, order.user_id, e
                    ))
                })?;
                account
                    .add_shares(&order.symbol, order.quantity)
                    .map_err(Error::InvalidOrder)?;

                Ok(receipt(order, price, cost, Amount::ZERO, cost, account.balance, &account.holdings))
            })
            .await
    }

    async fn apply_sell(&self, order: &Order, price: Price, gross: Amount) -> Result<TradeReceipt> {
        let (net, fee) = sell_proceeds(gross, self.sell_fee_rate);

        self.store
            .transact(&order.user_id, |account| {
                account.remove_shares(&order.symbol, order.quantity).map_err(|e| {
                    Error::InsufficientHoldings(format!(
                        "Cannot sell {} {} for {}: {}",
                        order.quantity, order.symbol, order.user_id, e
                    ))
                })?;
                account.credit(net).map_err(|e| {
                    Error::InvalidOrder(format!(
                        "Cannot credit sale of {} {} to {}: {}",
                        order.quantity, order.symbol, order.user_id, e
                    ))
                })?;

                Ok(receipt(order, price, gross, fee, net, account.balance, &account.holdings))
            })
            .await
    }
}

fn receipt(
    order: &Order,
    price: Price,
    gross: Amount,
    fee: Amount,
    net_amount: Amount,
    balance: Amount,
    holdings: &BTreeMap<Symbol, Quantity>,
) -> TradeReceipt {
    TradeReceipt {
        id: Uuid::new_v4(),
        user_id: order.user_id.clone(),
        symbol: order.symbol.clone(),
        side: order.side,
        quantity: order.quantity,
        price,
        gross,
        fee,
        net_amount,
        balance,
        holdings: holdings.clone(),
        executed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SELL_FEE_RATE;
    use common::decimal::dec;

    #[test]
    fn test_sell_proceeds_default_fee() {
        let (net, fee) = sell_proceeds(dec!(1000), DEFAULT_SELL_FEE_RATE);
        assert_eq!(net, dec!(992));
        assert_eq!(fee, dec!(8));
    }

    #[test]
    fn test_sell_proceeds_never_round_up() {
        let (net, fee) = sell_proceeds(dec!(0.00000001), DEFAULT_SELL_FEE_RATE);
        assert_eq!(net, dec!(0));
        assert_eq!(fee, dec!(0.00000001));
        assert_eq!(net + fee, dec!(0.00000001));
    }

    #[test]
    fn test_sell_proceeds_zero_fee() {
        let (net, fee) = sell_proceeds(dec!(123.45), dec!(0));
        assert_eq!(net, dec!(123.45));
        assert_eq!(fee, dec!(0));
    }
}
