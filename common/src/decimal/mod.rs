//! Decimal type utilities for precise financial calculations

use rust_decimal::{Decimal, RoundingStrategy};
pub use rust_decimal_macros::dec;

/// Price type with high precision
pub type Price = Decimal;

/// Cash amount type with high precision (balances, costs, proceeds)
pub type Amount = Decimal;

/// Whole-share quantity
pub type Quantity = u64;

/// Precision helpers for common operations
pub mod precision {
    use super::*;

    /// Default cash amount precision (8 decimal places)
    pub const AMOUNT_PRECISION: u32 = 8;

    /// Round a cash amount to standard precision, truncating toward zero.
    ///
    /// Proceeds credited to an account are never rounded up.
    pub fn round_amount(amount: Amount) -> Amount {
        amount.round_dp_with_strategy(AMOUNT_PRECISION, RoundingStrategy::ToZero)
    }
}

/// Market value of `quantity` shares at `price`, or `None` if it does not
/// fit in an `Amount`
pub fn notional(price: Price, quantity: Quantity) -> Option<Amount> {
    price.checked_mul(Decimal::from(quantity))
}
