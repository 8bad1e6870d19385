//! Account service: the stock ledger, trade execution and portfolio valuation

pub mod service;
pub mod repository;
pub mod config;
pub mod store;
pub mod engine;
pub mod valuation;

pub use service::{AccountService, HoldingsView, RepositoryType};
pub use repository::{AccountRepository, InMemoryAccountRepository, PostgresAccountRepository};
pub use config::LedgerConfig;
pub use store::LedgerStore;
pub use engine::{TradeEngine, TradeReceipt};
pub use valuation::{HoldingValuation, PortfolioValuation, PortfolioValuator};
