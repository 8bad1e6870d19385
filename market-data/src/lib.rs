//! Market data: price quotes for the ledger

pub mod oracle;

pub use oracle::{PriceOracle, StaticPriceOracle};
