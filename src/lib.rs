//! Simulated stock-trading ledger.
//!
//! Re-exports the workspace crates so downstream code and the end-to-end
//! tests can depend on a single package.

pub use account_service;
pub use common;
pub use market_data;

pub use account_service::{AccountService, LedgerConfig, PortfolioValuation, TradeReceipt};
pub use common::{Error, Result};
pub use market_data::{PriceOracle, StaticPriceOracle};
