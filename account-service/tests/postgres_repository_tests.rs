#![cfg(feature = "db_tests")]

use std::sync::Arc;

use account_service::{AccountRepository, AccountService, LedgerConfig, PostgresAccountRepository, RepositoryType};
use common::decimal::dec;
use common::error::Error;
use common::model::account::Account;
use dotenv::dotenv;
use market_data::StaticPriceOracle;
use uuid::Uuid;

// PostgreSQL integration tests for the ledger repository
// These tests require a running PostgreSQL database
// Run with: cargo test --features db_tests --test postgres_repository_tests -- --ignored

fn test_database_url() -> String {
    dotenv().ok();

    std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set to run PostgreSQL tests")
}

async fn create_test_repository() -> PostgresAccountRepository {
    PostgresAccountRepository::connect(&test_database_url(), 2)
        .await
        .expect("Failed to connect to test database")
}

fn unique_user(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

#[tokio::test]
#[ignore = "Requires test database"]
async fn test_postgres_create_and_load() {
    let repo = create_test_repository().await;
    let user_id = unique_user("create");

    let mut account = Account::new(&user_id, dec!(1500));
    account.add_shares("AAPL", 10).unwrap();

    assert!(repo.create_if_absent(&account).await.unwrap());
    assert!(!repo.create_if_absent(&account).await.unwrap());

    let loaded = repo.load(&user_id).await.unwrap().unwrap();
    assert_eq!(loaded.balance, dec!(1500));
    assert_eq!(loaded.shares("AAPL"), 10);

    assert!(repo.delete(&user_id).await.unwrap());
}

#[tokio::test]
#[ignore = "Requires test database"]
async fn test_postgres_save_replaces_holdings() {
    let repo = create_test_repository().await;
    let user_id = unique_user("save");

    let mut account = Account::new(&user_id, dec!(100));
    account.add_shares("AAPL", 2).unwrap();
    account.add_shares("MSFT", 5).unwrap();
    repo.create_if_absent(&account).await.unwrap();

    account.remove_shares("AAPL", 2).unwrap();
    account.credit(dec!(99.92)).unwrap();
    repo.save(&account).await.unwrap();

    let loaded = repo.load(&user_id).await.unwrap().unwrap();
    assert_eq!(loaded.balance, dec!(199.92));
    assert_eq!(loaded.shares("AAPL"), 0);
    assert_eq!(loaded.shares("MSFT"), 5);
    assert_eq!(loaded.holdings.len(), 1);

    repo.delete(&user_id).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires test database"]
async fn test_postgres_save_missing_account() {
    let repo = create_test_repository().await;
    let account = Account::new(unique_user("missing"), dec!(1));

    let result = repo.save(&account).await;
    assert!(matches!(result, Err(Error::AccountNotFound(_))));
}

#[tokio::test]
#[ignore = "Requires test database"]
async fn test_postgres_delete_cascades_holdings() {
    let repo = create_test_repository().await;
    let user_id = unique_user("delete");

    let mut account = Account::new(&user_id, dec!(10));
    account.add_shares("TSLA", 1).unwrap();
    repo.create_if_absent(&account).await.unwrap();

    assert!(repo.delete(&user_id).await.unwrap());
    assert!(repo.load(&user_id).await.unwrap().is_none());
    assert!(!repo.delete(&user_id).await.unwrap());

    // Recreating the id starts without holdings
    repo.create_if_absent(&Account::new(&user_id, dec!(0))).await.unwrap();
    assert!(repo.load(&user_id).await.unwrap().unwrap().holdings.is_empty());
    repo.delete(&user_id).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires test database"]
async fn test_postgres_service_round_trip() {
    let oracle = Arc::new(StaticPriceOracle::with_prices([("AAPL", dec!(100))]));
    let config = LedgerConfig::default();
    let user_id = unique_user("service");

    let service = AccountService::with_repository(RepositoryType::Postgres(test_database_url()), oracle.clone(), &config)
        .await
        .unwrap();
    service.provision_user(&user_id, dec!(1500)).await.unwrap();
    service.buy(&user_id, "AAPL", 10).await.unwrap();
    drop(service);

    let service = AccountService::with_repository(RepositoryType::Postgres(test_database_url()), oracle, &config)
        .await
        .unwrap();
    let sold = service.sell(&user_id, "AAPL", 10).await.unwrap();
    assert_eq!(sold.balance, dec!(1492));
    assert!(sold.holdings.is_empty());

    service.remove_user(&user_id).await.unwrap();
}
