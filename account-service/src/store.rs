//! Ledger store: per-account serialized read-modify-write over accounts
//!
//! Every account lives in its own slot guarded by its own async mutex, so
//! mutations on one user never wait on another. The store writes through to
//! an [`AccountRepository`] while the slot is still locked and only publishes
//! the new state once the write succeeded, which keeps every mutation
//! all-or-nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use common::decimal::Amount;
use common::error::{Error, ErrorExt, Result};
use common::model::account::Account;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::repository::AccountRepository;

struct AccountSlot {
    /// Creation sequence, used to list accounts in provisioning order
    seq: u64,
    /// `None` once the account was removed, or while its creation is pending
    state: Mutex<Option<Account>>,
}

/// Ledger store keyed by user id
pub struct LedgerStore {
    accounts: DashMap<String, Arc<AccountSlot>>,
    repo: Arc<dyn AccountRepository>,
    next_seq: AtomicU64,
    transaction_logging: bool,
}

fn not_found(user_id: &str) -> Error {
    Error::AccountNotFound(format!("Account not found: {}", user_id))
}

impl LedgerStore {
    /// Open a store over a repository, loading every persisted account
    pub async fn open(repo: Arc<dyn AccountRepository>) -> Result<Self> {
        let store = Self {
            accounts: DashMap::new(),
            repo,
            next_seq: AtomicU64::new(0),
            transaction_logging: false,
        };

        let accounts = store.repo.load_all().await
            .with_context(|| "Failed to load accounts")?;

        info!("Loaded {} accounts into the ledger", accounts.len());

        for account in accounts {
            let slot = store.new_slot(Some(account.clone()));
            store.accounts.insert(account.user_id, slot);
        }

        Ok(store)
    }

    /// Log every committed mutation at info level
    pub fn with_transaction_logging(mut self, enabled: bool) -> Self {
        self.transaction_logging = enabled;
        self
    }

    fn new_slot(&self, state: Option<Account>) -> Arc<AccountSlot> {
        Arc::new(AccountSlot {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(state),
        })
    }

    fn slot(&self, user_id: &str) -> Result<Arc<AccountSlot>> {
        // Clone the Arc out so the map shard is not held across an await
        self.accounts
            .get(user_id)
            .map(|slot| slot.value().clone())
            .ok_or_else(|| not_found(user_id))
    }

    /// Number of accounts in the ledger
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the ledger has no accounts
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Whether an account exists for the user id
    pub fn contains(&self, user_id: &str) -> bool {
        self.accounts.contains_key(user_id)
    }

    /// Get a consistent copy of one account
    pub async fn get(&self, user_id: &str) -> Result<Account> {
        let slot = self.slot(user_id)?;
        let state = slot.state.lock().await;
        state.clone().ok_or_else(|| not_found(user_id))
    }

    /// Create an account with an initial balance and no holdings
    pub async fn create(&self, user_id: &str, initial_balance: Amount) -> Result<Account> {
        let slot = self.new_slot(None);
        // Hold the fresh slot locked so concurrent readers wait for the outcome
        let mut state = slot.state.lock().await;

        match self.accounts.entry(user_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(Error::AccountAlreadyExists(format!("Account already exists: {}", user_id)));
            }
            Entry::Vacant(entry) => {
                entry.insert(slot.clone());
            }
        }

        let account = Account::new(user_id, initial_balance);
        let created = self.repo.create_if_absent(&account).await
            .with_context(|| format!("Failed to persist new account {}", user_id));

        match created {
            Ok(true) => {
                debug!("Created account {} with balance {}", user_id, initial_balance);
                *state = Some(account.clone());
                Ok(account)
            }
            Ok(false) => {
                self.accounts.remove_if(user_id, |_, s| Arc::ptr_eq(s, &slot));
                Err(Error::AccountAlreadyExists(format!("Account already exists: {}", user_id)))
            }
            Err(e) => {
                self.accounts.remove_if(user_id, |_, s| Arc::ptr_eq(s, &slot));
                Err(e)
            }
        }
    }

    /// Get an account, creating it with a zero balance if it does not exist.
    ///
    /// This is an explicit read-side fallback; trades never provision.
    pub async fn get_or_provision(&self, user_id: &str) -> Result<Account> {
        match self.get(user_id).await {
            Err(Error::AccountNotFound(_)) => match self.create(user_id, Amount::ZERO).await {
                Ok(account) => {
                    info!("Provisioned missing account {} with zero balance", user_id);
                    Ok(account)
                }
                // Lost a race with another provisioning call
                Err(Error::AccountAlreadyExists(_)) => self.get(user_id).await,
                Err(e) => Err(e),
            },
            other => other,
        }
    }

    /// Apply `mutation` atomically to one account.
    ///
    /// The mutation runs on a copy of the current state while the account is
    /// locked; on `Ok` the copy is persisted and becomes the new state, on
    /// `Err` nothing changes. Mutations on the same account are serialized,
    /// mutations on different accounts run concurrently.
    pub async fn transact<T, F>(&self, user_id: &str, mutation: F) -> Result<T>
    where
        F: FnOnce(&mut Account) -> Result<T> + Send,
        T: Send,
    {
        let slot = self.slot(user_id)?;
        let mut state = slot.state.lock().await;

        let current = state.as_ref().ok_or_else(|| not_found(user_id))?;
        let mut next = current.clone();

        let output = mutation(&mut next)?;

        self.repo.save(&next).await
            .with_context(|| format!("Failed to persist account {}", user_id))?;

        if self.transaction_logging {
            info!(
                "Committed ledger mutation for {}: balance {} -> {}, {} holdings",
                user_id, current.balance, next.balance, next.holdings.len()
            );
        }

        *state = Some(next);
        Ok(output)
    }

    /// Remove an account and all of its holdings.
    ///
    /// The id stays mapped until the repository delete has finished, so a
    /// concurrent `create` either sees the old account or a free id.
    pub async fn delete(&self, user_id: &str) -> Result<Account> {
        let slot = self.slot(user_id)?;
        let mut state = slot.state.lock().await;

        let account = state.clone().ok_or_else(|| not_found(user_id))?;

        self.repo.delete(user_id).await
            .with_context(|| format!("Failed to delete account {}", user_id))?;

        *state = None;
        self.accounts.remove_if(user_id, |_, s| Arc::ptr_eq(s, &slot));
        debug!("Deleted account {}", user_id);
        Ok(account)
    }

    /// Consistent copy of every account, in provisioning order.
    ///
    /// Each account is read under its own lock; the list is not a
    /// cross-account atomic snapshot.
    pub async fn snapshot(&self) -> Vec<Account> {
        let mut slots: Vec<Arc<AccountSlot>> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        slots.sort_by_key(|slot| slot.seq);

        let mut accounts = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(account) = slot.state.lock().await.clone() {
                accounts.push(account);
            }
        }
        accounts
    }
}
