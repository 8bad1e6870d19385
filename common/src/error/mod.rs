//! Error types for the stock ledger
//!
//! This module provides a unified error handling system for every crate in
//! the workspace. Each failure a caller can observe from the ledger maps to
//! exactly one variant, so transports can translate them without string
//! matching.

use std::fmt::Display;
use thiserror::Error;

/// Ledger error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed order: empty symbol, zero quantity, overflow
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// The price oracle could not supply a usable price
    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    /// Cash balance does not cover the cost of a buy
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Not enough shares held to cover a sell
    #[error("Insufficient holdings: {0}")]
    InsufficientHoldings(String),

    /// Error when an account cannot be found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Error when provisioning a user id that already has an account
    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    /// Generic validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait to add context to error results
pub trait ErrorExt<T> {
    /// Add context information to an error
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display;
}

impl<T> ErrorExt<T> for Result<T> {
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display,
    {
        self.map_err(|e| {
            let context = context_fn().to_string();
            match e {
                Error::InvalidOrder(msg) => Error::InvalidOrder(format!("{}: {}", context, msg)),
                Error::PriceUnavailable(msg) => Error::PriceUnavailable(format!("{}: {}", context, msg)),
                Error::InsufficientFunds(msg) => Error::InsufficientFunds(format!("{}: {}", context, msg)),
                Error::InsufficientHoldings(msg) => Error::InsufficientHoldings(format!("{}: {}", context, msg)),
                Error::AccountNotFound(msg) => Error::AccountNotFound(format!("{}: {}", context, msg)),
                Error::AccountAlreadyExists(msg) => Error::AccountAlreadyExists(format!("{}: {}", context, msg)),
                Error::ValidationError(msg) => Error::ValidationError(format!("{}: {}", context, msg)),
                Error::ConfigurationError(msg) => Error::ConfigurationError(format!("{}: {}", context, msg)),
                Error::Internal(msg) => Error::Internal(format!("{}: {}", context, msg)),
                Error::Database(e) => Error::Database(e),
                Error::Migration(e) => Error::Migration(e),
                Error::Serialization(e) => Error::Serialization(e),
            }
        })
    }
}

/// Trait for converting other error types to our Error type
pub trait IntoError {
    /// Convert to Error
    fn into_error(self, message: &str) -> Error;
}

impl<E: std::error::Error> IntoError for E {
    fn into_error(self, message: &str) -> Error {
        Error::Internal(format!("{}: {}", message, self))
    }
}
