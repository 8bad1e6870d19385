mod support;

use std::sync::Arc;

use account_service::service::{DEFAULT_SEED_BALANCE, DEFAULT_SEED_USERS};
use account_service::{AccountService, InMemoryAccountRepository, LedgerConfig, RepositoryType};
use common::decimal::dec;
use common::error::Error;
use market_data::StaticPriceOracle;
use support::service_with_prices;

#[tokio::test]
async fn test_provision_user() {
    let (service, _oracle) = service_with_prices(&[]).await;

    let view = service.provision_user("alice", dec!(250)).await.unwrap();
    assert_eq!(view.user_id, "alice");
    assert_eq!(view.balance, dec!(250));
    assert!(view.holdings.is_empty());

    let duplicate = service.provision_user("alice", dec!(1)).await;
    assert!(matches!(duplicate, Err(Error::AccountAlreadyExists(_))));
}

#[tokio::test]
async fn test_provision_user_validation() {
    let (service, _oracle) = service_with_prices(&[]).await;

    assert!(matches!(service.provision_user("  ", dec!(0)).await, Err(Error::ValidationError(_))));
    assert!(matches!(service.provision_user("bob", dec!(-5)).await, Err(Error::ValidationError(_))));
    assert!(service.all_holdings().await.is_empty());

    // Zero is a valid starting balance
    service.provision_user("bob", dec!(0)).await.unwrap();
}

#[tokio::test]
async fn test_remove_user_cascades_holdings() {
    let (service, _oracle) = service_with_prices(&[("AAPL", dec!(10))]).await;
    service.provision_user("alice", dec!(100)).await.unwrap();
    service.buy("alice", "AAPL", 3).await.unwrap();

    let removed = service.remove_user("alice").await.unwrap();
    assert_eq!(removed.holdings.get("AAPL"), Some(&3));

    assert!(matches!(service.holdings("alice").await, Err(Error::AccountNotFound(_))));
    assert!(matches!(service.remove_user("alice").await, Err(Error::AccountNotFound(_))));

    let again = service.provision_user("alice", dec!(5)).await.unwrap();
    assert!(again.holdings.is_empty());
}

#[tokio::test]
async fn test_set_balance() {
    let (service, _oracle) = service_with_prices(&[("AAPL", dec!(10))]).await;
    service.provision_user("alice", dec!(100)).await.unwrap();
    service.buy("alice", "AAPL", 2).await.unwrap();

    let view = service.set_balance("alice", dec!(1234.56)).await.unwrap();
    assert_eq!(view.balance, dec!(1234.56));
    // Holdings are untouched by a balance override
    assert_eq!(view.holdings.get("AAPL"), Some(&2));

    assert!(matches!(service.set_balance("ghost", dec!(1)).await, Err(Error::AccountNotFound(_))));
}

#[tokio::test]
async fn test_set_balance_allows_negative() {
    let (service, _oracle) = service_with_prices(&[("AAPL", dec!(10))]).await;
    service.provision_user("alice", dec!(100)).await.unwrap();
    service.buy("alice", "AAPL", 1).await.unwrap();

    let view = service.set_balance("alice", dec!(-50)).await.unwrap();
    assert_eq!(view.balance, dec!(-50));

    // Buys are refused while the balance is negative, sells still work
    assert!(matches!(service.buy("alice", "AAPL", 1).await, Err(Error::InsufficientFunds(_))));
    let sold = service.sell("alice", "AAPL", 1).await.unwrap();
    assert_eq!(sold.balance, dec!(-50) + dec!(9.92));
}

#[tokio::test]
async fn test_seed_users() {
    let (service, _oracle) = service_with_prices(&[]).await;
    service.provision_user("user3", dec!(7)).await.unwrap();

    let created = service.seed_users(DEFAULT_SEED_USERS, DEFAULT_SEED_BALANCE).await.unwrap();
    assert_eq!(created.len(), 9);
    assert!(!created.contains(&"user3".to_string()));

    let all = service.all_holdings().await;
    assert_eq!(all.len(), 10);
    assert_eq!(all[0].user_id, "user3");
    assert_eq!(all[0].balance, dec!(7));
    assert!(all[1..].iter().all(|view| view.balance == dec!(1500)));

    // Seeding again is a no-op
    assert!(service.seed_users(DEFAULT_SEED_USERS, DEFAULT_SEED_BALANCE).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_all_holdings_in_provisioning_order() {
    let (service, _oracle) = service_with_prices(&[("AAPL", dec!(1))]).await;
    for user in ["zed", "amy", "kim"] {
        service.provision_user(user, dec!(10)).await.unwrap();
    }
    service.buy("amy", "AAPL", 4).await.unwrap();

    let all = service.all_holdings().await;
    let ids: Vec<&str> = all.iter().map(|v| v.user_id.as_str()).collect();
    assert_eq!(ids, vec!["zed", "amy", "kim"]);
    assert_eq!(all[1].holdings.get("AAPL"), Some(&4));
}

#[tokio::test]
async fn test_service_reopens_persisted_state() {
    let repo = Arc::new(InMemoryAccountRepository::new());
    let oracle = Arc::new(StaticPriceOracle::with_prices([("AAPL", dec!(10))]));
    let config = LedgerConfig::default();

    let service = AccountService::with_repo(repo.clone(), oracle.clone(), &config).await.unwrap();
    service.provision_user("alice", dec!(100)).await.unwrap();
    service.buy("alice", "AAPL", 5).await.unwrap();
    drop(service);

    let service = AccountService::with_repo(repo, oracle, &config).await.unwrap();
    let view = service.holdings("alice").await.unwrap();
    assert_eq!(view.balance, dec!(50));
    assert_eq!(view.holdings.get("AAPL"), Some(&5));
}

#[tokio::test]
async fn test_custom_fee_rate() {
    let oracle = Arc::new(StaticPriceOracle::with_prices([("AAPL", dec!(100))]));
    let config = LedgerConfig::default().with_sell_fee_rate(dec!(0.01));
    let service = AccountService::with_repository(RepositoryType::InMemory, oracle, &config)
        .await
        .unwrap();

    service.provision_user("alice", dec!(100)).await.unwrap();
    service.buy("alice", "AAPL", 1).await.unwrap();
    let sold = service.sell("alice", "AAPL", 1).await.unwrap();
    assert_eq!(sold.fee, dec!(1));
    assert_eq!(sold.balance, dec!(99));
}

#[tokio::test]
async fn test_with_config_rejects_invalid_config() {
    let oracle = Arc::new(StaticPriceOracle::new());
    let config = LedgerConfig::default().with_sell_fee_rate(dec!(1.5));

    let result = AccountService::with_config(&config, oracle).await;
    assert!(matches!(result, Err(Error::ConfigurationError(_))));
}
