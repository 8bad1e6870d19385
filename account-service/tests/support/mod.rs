#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use account_service::{AccountRepository, AccountService, InMemoryAccountRepository, LedgerConfig};
use async_trait::async_trait;
use common::decimal::Price;
use common::error::{Error, Result};
use common::model::account::Account;
use market_data::{PriceOracle, StaticPriceOracle};

/// In-memory service quoting the given prices
pub async fn service_with_prices(prices: &[(&str, Price)]) -> (Arc<AccountService>, Arc<StaticPriceOracle>) {
    let oracle = Arc::new(StaticPriceOracle::with_prices(prices.iter().copied()));
    let service = AccountService::new(oracle.clone()).await.unwrap();
    (Arc::new(service), oracle)
}

/// Oracle that sleeps before answering for selected symbols
pub struct DelayedOracle {
    pub inner: StaticPriceOracle,
    pub delays: HashMap<String, Duration>,
}

impl DelayedOracle {
    pub fn new(prices: &[(&str, Price)], delays: &[(&str, Duration)]) -> Self {
        Self {
            inner: StaticPriceOracle::with_prices(prices.iter().copied()),
            delays: delays.iter().map(|(s, d)| (s.to_string(), *d)).collect(),
        }
    }
}

#[async_trait]
impl PriceOracle for DelayedOracle {
    async fn quote(&self, symbol: &str) -> Option<Price> {
        if let Some(delay) = self.delays.get(symbol) {
            tokio::time::sleep(*delay).await;
        }
        self.inner.quote(symbol).await
    }
}

/// Service over a [`DelayedOracle`] with a custom quote timeout
pub async fn service_with_delays(
    prices: &[(&str, Price)],
    delays: &[(&str, Duration)],
    quote_timeout: Duration,
) -> Arc<AccountService> {
    let oracle = Arc::new(DelayedOracle::new(prices, delays));
    let config = LedgerConfig::default().with_quote_timeout(quote_timeout);
    let service = AccountService::with_repo(Arc::new(InMemoryAccountRepository::new()), oracle, &config)
        .await
        .unwrap();
    Arc::new(service)
}

/// Repository whose writes can be made to fail, and whose deletes can be slowed down
#[derive(Default)]
pub struct FlakyRepository {
    pub inner: InMemoryAccountRepository,
    pub fail_writes: AtomicBool,
    pub delete_delay_ms: AtomicU64,
}

impl FlakyRepository {
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn set_delete_delay(&self, delay: Duration) {
        self.delete_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Internal("storage offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for FlakyRepository {
    async fn load(&self, user_id: &str) -> Result<Option<Account>> {
        self.inner.load(user_id).await
    }

    async fn load_all(&self) -> Result<Vec<Account>> {
        self.inner.load_all().await
    }

    async fn save(&self, account: &Account) -> Result<()> {
        self.check()?;
        self.inner.save(account).await
    }

    async fn create_if_absent(&self, account: &Account) -> Result<bool> {
        self.check()?;
        self.inner.create_if_absent(account).await
    }

    async fn delete(&self, user_id: &str) -> Result<bool> {
        self.check()?;
        let delay = self.delete_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.delete(user_id).await
    }
}
