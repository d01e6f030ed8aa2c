//! Pip normalization for currency pairs

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Size of one pip in quote-currency units: 0.01 for JPY-quoted pairs, 0.0001 otherwise
pub fn pip_size(pair: &str) -> Decimal {
    let quote = pair.rsplit('/').next().unwrap_or(pair);
    if quote.trim().eq_ignore_ascii_case("JPY") {
        dec!(0.01)
    } else {
        dec!(0.0001)
    }
}

/// Absolute price difference expressed in pips
pub fn to_pips(pair: &str, delta: Decimal) -> Decimal {
    delta.abs() / pip_size(pair)
}

/// Price distance of `pips` pips
pub fn from_pips(pair: &str, pips: Decimal) -> Decimal {
    pips * pip_size(pair)
}
