use std::sync::Arc;

use account_service::service::{DEFAULT_SEED_BALANCE, DEFAULT_SEED_USERS};
use account_service::{AccountService, LedgerConfig};
use clap::{Parser, Subcommand};
use common::decimal::{Amount, Price, Quantity};
use common::error::{Error, Result};
use market_data::StaticPriceOracle;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stock ledger CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Set the log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Database URL (falls back to DATABASE_URL). Without one, each run uses a
    /// fresh in-memory ledger pre-seeded with user1..user10 at 1500
    #[arg(short, long)]
    database_url: Option<String>,

    /// Log every committed ledger mutation
    #[arg(short, long)]
    transaction_logging: bool,

    /// Price quoted for a symbol, as SYMBOL=PRICE (repeatable)
    #[arg(short, long = "price", value_parser = parse_price)]
    prices: Vec<(String, Price)>,

    /// Commands
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision user1..userN with a starting balance
    Seed {
        #[arg(short, long, default_value_t = DEFAULT_SEED_USERS)]
        count: usize,
        #[arg(short, long, default_value_t = DEFAULT_SEED_BALANCE)]
        balance: Amount,
    },
    /// Create a user account
    Provision {
        user_id: String,
        #[arg(short, long, default_value_t = Amount::ZERO)]
        balance: Amount,
    },
    /// Delete a user account and its holdings
    Remove { user_id: String },
    /// Overwrite a user's cash balance
    SetBalance {
        user_id: String,
        #[arg(allow_hyphen_values = true)]
        balance: Amount,
    },
    /// Buy shares at the quoted price
    Buy {
        user_id: String,
        symbol: String,
        quantity: Quantity,
    },
    /// Sell shares at the quoted price
    Sell {
        user_id: String,
        symbol: String,
        quantity: Quantity,
    },
    /// Show a user's balance and holdings
    Holdings { user_id: String },
    /// Show every user's balance and holdings
    Accounts,
    /// Show a user's net portfolio value
    Value { user_id: String },
    /// Show every user's net portfolio value, highest first
    Leaderboard,
}

fn parse_price(raw: &str) -> std::result::Result<(String, Price), String> {
    let (symbol, price) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SYMBOL=PRICE, got {:?}", raw))?;
    let price = price
        .trim()
        .parse::<Price>()
        .map_err(|e| format!("invalid price for {}: {}", symbol, e))?;
    Ok((symbol.trim().to_string(), price))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// In-memory runs start empty, so every command but `seed` gets the default users
fn seeds_demo_users(config: &LedgerConfig, command: &Commands) -> bool {
    config.database_url.is_none() && !matches!(command, Commands::Seed { .. })
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = LedgerConfig::from_env()?;
    if cli.database_url.is_some() {
        config.database_url = cli.database_url;
    }
    config.transaction_logging |= cli.transaction_logging;

    info!(
        "Starting ledger ({} storage), sell fee rate {}, quote timeout {:?}",
        if config.database_url.is_some() { "postgres" } else { "in-memory" },
        config.sell_fee_rate,
        config.quote_timeout
    );

    let oracle = Arc::new(StaticPriceOracle::with_prices(cli.prices));
    let service = AccountService::with_config(&config, oracle).await?;

    if seeds_demo_users(&config, &cli.command) {
        let seeded = service.seed_users(DEFAULT_SEED_USERS, DEFAULT_SEED_BALANCE).await?;
        info!("Seeded {} demo users into the in-memory ledger", seeded.len());
    }

    match cli.command {
        Commands::Seed { count, balance } => print_json(&service.seed_users(count, balance).await?),
        Commands::Provision { user_id, balance } => print_json(&service.provision_user(&user_id, balance).await?),
        Commands::Remove { user_id } => print_json(&service.remove_user(&user_id).await?),
        Commands::SetBalance { user_id, balance } => print_json(&service.set_balance(&user_id, balance).await?),
        Commands::Buy { user_id, symbol, quantity } => print_json(&service.buy(&user_id, &symbol, quantity).await?),
        Commands::Sell { user_id, symbol, quantity } => print_json(&service.sell(&user_id, &symbol, quantity).await?),
        Commands::Holdings { user_id } => print_json(&service.holdings(&user_id).await?),
        Commands::Accounts => print_json(&service.all_holdings().await),
        Commands::Value { user_id } => print_json(&service.net_worth(&user_id).await?),
        Commands::Leaderboard => print_json(&service.all_net_worth().await),
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Parse command line arguments
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "account_service={0},market_data={0}",
            cli.log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        let code = match e {
            Error::InvalidOrder(_) | Error::ValidationError(_) | Error::ConfigurationError(_) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}
