//! Account service implementation
//!
//! Facade the transport layer calls: trades, valuation, holdings views and
//! administrator operations over one shared ledger store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use common::decimal::{dec, Amount, Quantity};
use common::error::{Error, ErrorExt, Result};
use common::model::account::Account;
use common::model::order::{Order, Symbol, UserId};
use market_data::PriceOracle;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LedgerConfig;
use crate::engine::{TradeEngine, TradeReceipt};
use crate::repository::{AccountRepository, InMemoryAccountRepository, PostgresAccountRepository};
use crate::store::LedgerStore;
use crate::valuation::{PortfolioValuation, PortfolioValuator};

/// Default number of demo users created by [`AccountService::seed_users`]
pub const DEFAULT_SEED_USERS: usize = 10;

/// Default starting balance of demo users
pub const DEFAULT_SEED_BALANCE: Amount = dec!(1500);

/// Repository Type
pub enum RepositoryType {
    /// In-memory repository
    InMemory,
    /// PostgreSQL repository
    Postgres(String),
}

/// Balance and holdings of one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsView {
    pub user_id: UserId,
    pub balance: Amount,
    pub holdings: BTreeMap<Symbol, Quantity>,
}

impl From<Account> for HoldingsView {
    fn from(account: Account) -> Self {
        Self {
            user_id: account.user_id,
            balance: account.balance,
            holdings: account.holdings,
        }
    }
}

/// Account service for trading, valuation and administration
pub struct AccountService {
    store: Arc<LedgerStore>,
    engine: TradeEngine,
    valuator: PortfolioValuator,
}

impl AccountService {
    /// Create an in-memory account service with default settings
    pub async fn new(oracle: Arc<dyn PriceOracle>) -> Result<Self> {
        Self::with_repository(RepositoryType::InMemory, oracle, &LedgerConfig::default()).await
    }

    /// Create a new account service with a specific repository type
    pub async fn with_repository(
        repo_type: RepositoryType,
        oracle: Arc<dyn PriceOracle>,
        config: &LedgerConfig,
    ) -> Result<Self> {
        let repo: Arc<dyn AccountRepository> = match repo_type {
            RepositoryType::InMemory => Arc::new(InMemoryAccountRepository::new()),
            RepositoryType::Postgres(database_url) => {
                Arc::new(PostgresAccountRepository::connect(&database_url, config.db_pool_size).await?)
            }
        };

        Self::with_repo(repo, oracle, config).await
    }

    /// Create a new account service with a configuration
    pub async fn with_config(config: &LedgerConfig, oracle: Arc<dyn PriceOracle>) -> Result<Self> {
        config.validate()?;

        let repo_type = match &config.database_url {
            Some(url) => RepositoryType::Postgres(url.clone()),
            None => RepositoryType::InMemory,
        };

        Self::with_repository(repo_type, oracle, config).await
    }

    /// Create an account service over an existing repository
    pub async fn with_repo(
        repo: Arc<dyn AccountRepository>,
        oracle: Arc<dyn PriceOracle>,
        config: &LedgerConfig,
    ) -> Result<Self> {
        let store = Arc::new(
            LedgerStore::open(repo)
                .await?
                .with_transaction_logging(config.transaction_logging),
        );

        Ok(Self {
            engine: TradeEngine::with_config(store.clone(), oracle.clone(), config),
            valuator: PortfolioValuator::with_config(store.clone(), oracle, config),
            store,
        })
    }

    /// The underlying ledger store
    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    /// Buy shares at the current price
    pub async fn buy(&self, user_id: &str, symbol: &str, quantity: Quantity) -> Result<TradeReceipt> {
        self.engine.buy(user_id, symbol, quantity).await
    }

    /// Sell shares at the current price, less the sell fee
    pub async fn sell(&self, user_id: &str, symbol: &str, quantity: Quantity) -> Result<TradeReceipt> {
        self.engine.sell(user_id, symbol, quantity).await
    }

    /// Execute an order
    pub async fn execute(&self, order: Order) -> Result<TradeReceipt> {
        self.engine.execute(order).await
    }

    /// Net worth of one user
    pub async fn net_worth(&self, user_id: &str) -> Result<PortfolioValuation> {
        self.valuator.net_worth(user_id).await
    }

    /// Net worth of every user, highest first
    pub async fn all_net_worth(&self) -> Vec<PortfolioValuation> {
        self.valuator.all_net_worth().await
    }

    /// Balance and holdings of one user
    pub async fn holdings(&self, user_id: &str) -> Result<HoldingsView> {
        self.store.get(user_id).await.map(HoldingsView::from)
    }

    /// Balance and holdings of every user, in provisioning order
    pub async fn all_holdings(&self) -> Vec<HoldingsView> {
        self.store.snapshot().await.into_iter().map(HoldingsView::from).collect()
    }

    /// Create a user account with a starting balance
    pub async fn provision_user(&self, user_id: &str, initial_balance: Amount) -> Result<HoldingsView> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(Error::ValidationError("User id is required".to_string()));
        }
        if initial_balance < Amount::ZERO {
            return Err(Error::ValidationError(format!(
                "Initial balance must not be negative, got {}",
                initial_balance
            )));
        }

        info!("Provisioning user {} with balance {}", user_id, initial_balance);
        self.store.create(user_id, initial_balance).await.map(HoldingsView::from)
    }

    /// Remove a user account together with its holdings
    pub async fn remove_user(&self, user_id: &str) -> Result<HoldingsView> {
        info!("Removing user {}", user_id);
        self.store.delete(user_id).await.map(HoldingsView::from)
    }

    /// Overwrite a user's cash balance.
    ///
    /// Any value is accepted, including negative balances; a negative balance
    /// simply blocks further buys until it is raised again.
    pub async fn set_balance(&self, user_id: &str, new_balance: Amount) -> Result<HoldingsView> {
        if new_balance < Amount::ZERO {
            warn!("Setting negative balance {} for {}", new_balance, user_id);
        }

        let account = self
            .store
            .transact(user_id, |account| {
                account.balance = new_balance;
                account.updated_at = Utc::now();
                Ok(account.clone())
            })
            .await
            .with_context(|| format!("Failed to set balance for {}", user_id))?;

        info!("Updated {}'s balance to {}", user_id, new_balance);
        Ok(account.into())
    }

    /// Provision `user1..=userN` with `balance`, skipping ids that already exist.
    ///
    /// Returns the user ids that were created.
    pub async fn seed_users(&self, count: usize, balance: Amount) -> Result<Vec<UserId>> {
        let mut created = Vec::with_capacity(count);

        for i in 1..=count {
            let user_id = format!("user{}", i);
            match self.provision_user(&user_id, balance).await {
                Ok(_) => created.push(user_id),
                Err(Error::AccountAlreadyExists(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        info!("{} users seeded with balance {}", created.len(), balance);
        Ok(created)
    }
}
