//! Common types and utilities for the stock ledger
//!
//! This library contains the shared types used by every crate in the
//! workspace: the money and quantity representation, the account and order
//! models, and a unified error type that crosses crate boundaries.

pub mod error;
pub mod model;
pub mod decimal;

/// Re-export important types
pub use error::{Error, Result, ErrorExt, IntoError};
pub use decimal::*;
