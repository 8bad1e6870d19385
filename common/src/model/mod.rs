//! Domain models for the stock ledger

pub mod order;
pub mod market;
pub mod account;
