//! Arbitrary-precision decimal facade.
//!
//! The search engine and materializer never touch floating point. Every
//! operation here takes an explicit result scale and rounds HALF-UP
//! (`MidpointAwayFromZero`), matching the decimal contract the specification
//! assumes. Backed by `rust_decimal`, which the upstream trading backend already
//! depends on (previously only exercised for a lossy database round-trip).

use rust_decimal::{Decimal, RoundingStrategy};
use std::cmp::Ordering;
use thiserror::Error;

pub const CANONICAL_SCALE: u32 = 18;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecimalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid decimal literal: {0}")]
    InvalidLiteral(String),
    #[error("scale {0} exceeds maximum supported precision")]
    ScaleOverflow(u32),
}

fn check_scale(scale: u32) -> Result<(), DecimalError> {
    if scale > 28 {
        Err(DecimalError::ScaleOverflow(scale))
    } else {
        Ok(())
    }
}

/// Rounds `value` to `scale` fractional digits, HALF-UP (ties away from zero).
pub fn round(value: Decimal, scale: u32) -> Result<Decimal, DecimalError> {
    check_scale(scale)?;
    Ok(value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero))
}

pub fn add(a: Decimal, b: Decimal, scale: u32) -> Result<Decimal, DecimalError> {
    round(a + b, scale)
}

pub fn sub(a: Decimal, b: Decimal, scale: u32) -> Result<Decimal, DecimalError> {
    round(a - b, scale)
}

pub fn mul(a: Decimal, b: Decimal, scale: u32) -> Result<Decimal, DecimalError> {
    round(a * b, scale)
}

pub fn div(a: Decimal, b: Decimal, scale: u32) -> Result<Decimal, DecimalError> {
    if b.is_zero() {
        return Err(DecimalError::DivisionByZero);
    }
    round(a / b, scale)
}

pub fn compare(a: Decimal, b: Decimal) -> Ordering {
    a.cmp(&b)
}

pub fn parse(literal: &str) -> Result<Decimal, DecimalError> {
    literal
        .parse::<Decimal>()
        .map_err(|_| DecimalError::InvalidLiteral(literal.to_string()))
}

/// Normalizes to the given scale without rounding away significant digits
/// beyond it (used when aligning two operands' scales before a comparison).
pub fn normalize(value: Decimal, scale: u32) -> Result<Decimal, DecimalError> {
    round(value, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn half_up_rounds_ties_away_from_zero() {
        assert_eq!(round(dec!(0.125), 2).unwrap(), dec!(0.13));
        assert_eq!(round(dec!(-0.125), 2).unwrap(), dec!(-0.13));
    }

    #[test]
    fn div_by_zero_is_an_error() {
        assert_eq!(div(dec!(1), dec!(0), 8), Err(DecimalError::DivisionByZero));
    }

    #[test]
    fn mul_rounds_to_requested_scale() {
        assert_eq!(mul(dec!(100), dec!(0.9), 3).unwrap(), dec!(90.000));
    }
}
