//! Repository for account data

use std::collections::BTreeMap;

use async_trait::async_trait;
use common::decimal::{Amount, Quantity};
use common::error::{Error, IntoError, Result};
use common::model::account::Account;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::{debug, info};

/// Account repository trait defining the interface for durable account storage.
///
/// The ledger store serializes all writes to a given user id, so
/// implementations only need each call to be atomic on its own.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Load one account with its holdings
    async fn load(&self, user_id: &str) -> Result<Option<Account>>;

    /// Load every account, oldest first
    async fn load_all(&self) -> Result<Vec<Account>>;

    /// Replace the stored state of an existing account
    async fn save(&self, account: &Account) -> Result<()>;

    /// Store a new account; returns `false` if the user id is taken
    async fn create_if_absent(&self, account: &Account) -> Result<bool>;

    /// Remove an account and its holdings; returns `false` if it was absent
    async fn delete(&self, user_id: &str) -> Result<bool>;
}

/// In-memory repository for account data
pub struct InMemoryAccountRepository {
    /// Accounts by user ID
    pub accounts: DashMap<String, Account>,
}

impl InMemoryAccountRepository {
    /// Create a new in-memory account repository
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }
}

impl Default for InMemoryAccountRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn load(&self, user_id: &str) -> Result<Option<Account>> {
        Ok(self.accounts.get(user_id).map(|a| a.clone()))
    }

    async fn load_all(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.accounts.iter().map(|entry| entry.value().clone()).collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.user_id.cmp(&b.user_id)));
        Ok(accounts)
    }

    async fn save(&self, account: &Account) -> Result<()> {
        match self.accounts.get_mut(&account.user_id) {
            Some(mut stored) => {
                *stored = account.clone();
                Ok(())
            }
            None => Err(Error::AccountNotFound(format!("Account not found: {}", account.user_id))),
        }
    }

    async fn create_if_absent(&self, account: &Account) -> Result<bool> {
        match self.accounts.entry(account.user_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(account.clone());
                Ok(true)
            }
        }
    }

    async fn delete(&self, user_id: &str) -> Result<bool> {
        Ok(self.accounts.remove(user_id).is_some())
    }
}

/// PostgreSQL repository for account data
pub struct PostgresAccountRepository {
    /// Database connection pool
    pool: PgPool,
}

impl PostgresAccountRepository {
    /// Connect to PostgreSQL and apply pending migrations
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self> {
        info!("Connecting to PostgreSQL database with pool size: {}", pool_size);

        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await
            .map_err(Error::Database)?;

        info!("Connected to PostgreSQL database");

        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool; the schema must already be migrated
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_holdings(&self, user_id: &str) -> Result<BTreeMap<String, Quantity>> {
        let rows = sqlx::query("SELECT symbol, quantity FROM ledger_holdings WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|row| holding_from_row(&row)).collect()
    }
}

/// Run the ledger schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../migrations").run(pool).await?;
    Ok(())
}

fn parse_balance(raw: &str) -> Result<Amount> {
    raw.parse::<Amount>()
        .map_err(|e| e.into_error("Invalid balance format"))
}

fn holding_from_row(row: &sqlx::postgres::PgRow) -> Result<(String, Quantity)> {
    let symbol: String = row.get("symbol");
    let quantity: i64 = row.get("quantity");
    let quantity = Quantity::try_from(quantity)
        .map_err(|e| e.into_error(&format!("Invalid stored quantity for {}", symbol)))?;
    Ok((symbol, quantity))
}

fn stored_quantity(symbol: &str, quantity: Quantity) -> Result<i64> {
    i64::try_from(quantity).map_err(|e| e.into_error(&format!("Quantity of {} too large to store", symbol)))
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn load(&self, user_id: &str) -> Result<Option<Account>> {
        debug!("Loading account from database: {}", user_id);

        let row = sqlx::query(
            "SELECT user_id, balance, created_at, updated_at FROM ledger_accounts WHERE user_id = $1"
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let balance_str: String = row.get("balance");
                let account = Account {
                    user_id: row.get("user_id"),
                    balance: parse_balance(&balance_str)?,
                    holdings: self.load_holdings(user_id).await?,
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                };
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    async fn load_all(&self) -> Result<Vec<Account>> {
        debug!("Loading all accounts from database");

        let rows = sqlx::query(
            "SELECT user_id, balance, created_at, updated_at
             FROM ledger_accounts
             ORDER BY created_at, user_id"
        )
        .fetch_all(&self.pool)
        .await?;

        let holding_rows = sqlx::query("SELECT user_id, symbol, quantity FROM ledger_holdings")
            .fetch_all(&self.pool)
            .await?;

        let mut holdings: BTreeMap<String, BTreeMap<String, Quantity>> = BTreeMap::new();
        for row in holding_rows {
            let user_id: String = row.get("user_id");
            let (symbol, quantity) = holding_from_row(&row)?;
            holdings.entry(user_id).or_default().insert(symbol, quantity);
        }

        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            let user_id: String = row.get("user_id");
            let balance_str: String = row.get("balance");
            accounts.push(Account {
                balance: parse_balance(&balance_str)?,
                holdings: holdings.remove(&user_id).unwrap_or_default(),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
                user_id,
            });
        }

        Ok(accounts)
    }

    async fn save(&self, account: &Account) -> Result<()> {
        debug!("Saving account to database: {}", account.user_id);

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE ledger_accounts SET balance = $2, updated_at = $3 WHERE user_id = $1"
        )
        .bind(&account.user_id)
        .bind(account.balance.to_string())
        .bind(account.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(Error::AccountNotFound(format!("Account not found: {}", account.user_id)));
        }

        sqlx::query("DELETE FROM ledger_holdings WHERE user_id = $1")
            .bind(&account.user_id)
            .execute(&mut *tx)
            .await?;

        for (symbol, quantity) in &account.holdings {
            sqlx::query("INSERT INTO ledger_holdings (user_id, symbol, quantity) VALUES ($1, $2, $3)")
                .bind(&account.user_id)
                .bind(symbol)
                .bind(stored_quantity(symbol, *quantity)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_if_absent(&self, account: &Account) -> Result<bool> {
        debug!("Creating account in database: {}", account.user_id);

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO ledger_accounts (user_id, balance, created_at, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id) DO NOTHING"
        )
        .bind(&account.user_id)
        .bind(account.balance.to_string())
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for (symbol, quantity) in &account.holdings {
            sqlx::query("INSERT INTO ledger_holdings (user_id, symbol, quantity) VALUES ($1, $2, $3)")
                .bind(&account.user_id)
                .bind(symbol)
                .bind(stored_quantity(symbol, *quantity)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn delete(&self, user_id: &str) -> Result<bool> {
        debug!("Deleting account from database: {}", user_id);

        // Holdings go with the account via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM ledger_accounts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::decimal::dec;

    #[tokio::test]
    async fn test_in_memory_create_if_absent() {
        let repo = InMemoryAccountRepository::new();
        let account = Account::new("user1", dec!(1500));

        assert!(repo.create_if_absent(&account).await.unwrap());
        assert!(!repo.create_if_absent(&Account::new("user1", dec!(1))).await.unwrap());

        let stored = repo.load("user1").await.unwrap().unwrap();
        assert_eq!(stored.balance, dec!(1500));
    }

    #[tokio::test]
    async fn test_in_memory_save_requires_existing_account() {
        let repo = InMemoryAccountRepository::new();
        let result = repo.save(&Account::new("ghost", dec!(0))).await;
        assert!(matches!(result, Err(Error::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_in_memory_delete() {
        let repo = InMemoryAccountRepository::new();
        repo.create_if_absent(&Account::new("user1", dec!(0))).await.unwrap();

        assert!(repo.delete("user1").await.unwrap());
        assert!(!repo.delete("user1").await.unwrap());
        assert!(repo.load("user1").await.unwrap().is_none());
    }
}
