//! Money arithmetic helpers.
//!
//! All monetary values are `rust_decimal::Decimal` with 2-digit scale at
//! external boundaries, rounded half-up.

use rust_decimal::{Decimal, RoundingStrategy};

/// Monetary values carry 2 decimal places
pub const DECIMAL_PLACES: u32 = 2;

/// Round to money scale, half-up.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// A discount may never exceed the subtotal or fall below zero.
pub fn clamp_discount(subtotal: Decimal, discount: Decimal) -> Decimal {
    discount.max(Decimal::ZERO).min(subtotal.max(Decimal::ZERO))
}

/// `final_total = max(subtotal - discount, 0)`
pub fn final_total(subtotal: Decimal, discount: Decimal) -> Decimal {
    (subtotal - discount).max(Decimal::ZERO)
}
