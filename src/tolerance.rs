//! Residual tolerance evaluation (§4.7): how far the amount a materialized
//! path actually spends diverges from what the caller requested, and whether
//! that divergence is within the caller's accepted window.

use crate::decimal;
use rust_decimal::Decimal;

/// Asymmetric acceptance window around a requested spend amount.
#[derive(Debug, Clone, Copy)]
pub struct ToleranceWindow {
    pub min_tolerance: Decimal,
    pub max_tolerance: Decimal,
}

impl ToleranceWindow {
    pub fn exact() -> Self {
        ToleranceWindow {
            min_tolerance: Decimal::ZERO,
            max_tolerance: Decimal::ZERO,
        }
    }
}

/// `|actual - requested| / requested` at scale 18, 0 when `requested == 0`.
pub fn residual(requested: Decimal, actual: Decimal) -> Decimal {
    if requested.is_zero() {
        return Decimal::ZERO;
    }
    decimal::round((actual - requested).abs() / requested.abs(), 18).expect("scale 18 is always valid")
}

/// `Ok(residual)` if `actual` falls within `window` of `requested`; otherwise
/// `Err(residual)` carrying the violating value for diagnostics.
pub fn within_window(requested: Decimal, actual: Decimal, window: ToleranceWindow) -> Result<Decimal, Decimal> {
    let r = residual(requested, actual);
    if actual < requested {
        if r > window.min_tolerance {
            return Err(r);
        }
    } else if actual > requested {
        if r > window.max_tolerance {
            return Err(r);
        }
    }
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn exact_match_has_zero_residual() {
        assert_eq!(residual(dec!(100), dec!(100)), dec!(0));
    }

    #[test]
    fn requested_zero_is_always_zero_residual() {
        assert_eq!(residual(dec!(0), dec!(50)), dec!(0));
    }

    #[test]
    fn undershoot_checked_against_min_tolerance() {
        let window = ToleranceWindow {
            min_tolerance: dec!(0.01),
            max_tolerance: dec!(0.05),
        };
        assert!(within_window(dec!(100), dec!(99.5), window).is_err());
        assert!(within_window(dec!(100), dec!(99.9), window).is_ok());
    }

    #[test]
    fn overshoot_checked_against_max_tolerance() {
        let window = ToleranceWindow {
            min_tolerance: dec!(0.01),
            max_tolerance: dec!(0.05),
        };
        assert!(within_window(dec!(100), dec!(104), window).is_ok());
        assert!(within_window(dec!(100), dec!(106), window).is_err());
    }
}
