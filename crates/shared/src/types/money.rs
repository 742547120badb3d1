//! Amount helpers with decimal precision.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! All amounts are soles (`S/.`) held as `rust_decimal::Decimal`.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places stored for every amount.
pub const AMOUNT_SCALE: u32 = 2;

/// Rounds an amount to the stored scale using Banker's Rounding.
#[must_use]
pub fn normalize_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Formats an amount the way receipts and ledger descriptions show it.
///
/// ```
/// use campus_shared::types::money::format_soles;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_soles(Decimal::new(1005, 1)), "S/.100.50");
/// ```
#[must_use]
pub fn format_soles(amount: Decimal) -> String {
    let mut rounded = normalize_amount(amount);
    rounded.rescale(AMOUNT_SCALE);
    format!("S/.{rounded}")
}
