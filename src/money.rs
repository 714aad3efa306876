//! Money and exchange-rate value types.
//!
//! Both are immutable once constructed. Arithmetic across two `Money` values
//! requires matching currencies; every operation takes an explicit result scale
//! (see [`crate::decimal`]).

use crate::decimal::{self, DecimalError};
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;

fn currency_is_valid(code: &str) -> bool {
    let len = code.len();
    (3..=12).contains(&len) && code.chars().all(|c| c.is_ascii_uppercase())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyError(pub String);

impl fmt::Display for CurrencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "currency code '{}' must be 3-12 uppercase ASCII letters", self.0)
    }
}

/// An amount of a single currency, carried at an explicit decimal scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Money {
    currency: [u8; 12],
    currency_len: u8,
    amount: Decimal,
    scale: u32,
}

impl Money {
    pub fn new(currency: &str, amount: Decimal, scale: u32) -> Result<Self, CurrencyError> {
        if !currency_is_valid(currency) {
            return Err(CurrencyError(currency.to_string()));
        }
        let mut buf = [0u8; 12];
        buf[..currency.len()].copy_from_slice(currency.as_bytes());
        Ok(Money {
            currency: buf,
            currency_len: currency.len() as u8,
            amount: amount.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero),
            scale,
        })
    }

    pub fn zero(currency: &str, scale: u32) -> Result<Self, CurrencyError> {
        Money::new(currency, Decimal::ZERO, scale)
    }

    pub fn currency(&self) -> &str {
        std::str::from_utf8(&self.currency[..self.currency_len as usize]).unwrap()
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn with_scale(&self, scale: u32) -> Result<Self, DecimalError> {
        Ok(Money {
            currency: self.currency,
            currency_len: self.currency_len,
            amount: decimal::normalize(self.amount, scale)?,
            scale,
        })
    }

    fn require_same_currency(&self, other: &Money) -> Result<(), DecimalError> {
        if self.currency() != other.currency() {
            return Err(DecimalError::InvalidLiteral(format!(
                "currency mismatch: {} vs {}",
                self.currency(),
                other.currency()
            )));
        }
        Ok(())
    }

    pub fn add(&self, other: &Money, scale: u32) -> Result<Money, DecimalError> {
        self.require_same_currency(other)?;
        let amount = decimal::add(self.amount, other.amount, scale)?;
        Ok(Money {
            currency: self.currency,
            currency_len: self.currency_len,
            amount,
            scale,
        })
    }

    pub fn sub(&self, other: &Money, scale: u32) -> Result<Money, DecimalError> {
        self.require_same_currency(other)?;
        let amount = decimal::sub(self.amount, other.amount, scale)?;
        Ok(Money {
            currency: self.currency,
            currency_len: self.currency_len,
            amount,
            scale,
        })
    }

    pub fn clamp(&self, min: &Money, max: &Money) -> Result<Money, DecimalError> {
        self.require_same_currency(min)?;
        self.require_same_currency(max)?;
        if self.amount < min.amount {
            return Ok(*min);
        }
        if self.amount > max.amount {
            return Ok(*max);
        }
        Ok(*self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency())
    }
}

/// A conversion rate from `base` to `quote`: `1 base == rate quote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeRate {
    base: [u8; 12],
    base_len: u8,
    quote: [u8; 12],
    quote_len: u8,
    rate: Decimal,
    scale: u32,
}

impl ExchangeRate {
    pub fn new(base: &str, quote: &str, rate: Decimal, scale: u32) -> Result<Self, CurrencyError> {
        if !currency_is_valid(base) {
            return Err(CurrencyError(base.to_string()));
        }
        if !currency_is_valid(quote) {
            return Err(CurrencyError(quote.to_string()));
        }
        let mut base_buf = [0u8; 12];
        base_buf[..base.len()].copy_from_slice(base.as_bytes());
        let mut quote_buf = [0u8; 12];
        quote_buf[..quote.len()].copy_from_slice(quote.as_bytes());
        Ok(ExchangeRate {
            base: base_buf,
            base_len: base.len() as u8,
            quote: quote_buf,
            quote_len: quote.len() as u8,
            rate: rate.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero),
            scale,
        })
    }

    pub fn base(&self) -> &str {
        std::str::from_utf8(&self.base[..self.base_len as usize]).unwrap()
    }

    pub fn quote(&self) -> &str {
        std::str::from_utf8(&self.quote[..self.quote_len as usize]).unwrap()
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Reciprocal rate, same scale, with base/quote swapped.
    pub fn invert(&self) -> Result<ExchangeRate, DecimalError> {
        let inverted = decimal::div(Decimal::ONE, self.rate, self.scale)?;
        Ok(ExchangeRate {
            base: self.quote,
            base_len: self.quote_len,
            quote: self.base,
            quote_len: self.base_len,
            rate: inverted,
            scale: self.scale,
        })
    }

    /// Converts an amount of `base` into an amount of `quote` at this rate,
    /// rounding HALF-UP to `result_scale`.
    pub fn convert(&self, amount: Decimal, result_scale: u32) -> Result<Decimal, DecimalError> {
        let working_scale = result_scale.max(self.scale) + 6;
        let raw = decimal::mul(amount, self.rate, working_scale)?;
        decimal::round(raw, result_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_invalid_currency_codes() {
        assert!(Money::new("us", dec!(1), 2).is_err());
        assert!(Money::new("US1", dec!(1), 2).is_err());
        assert!(Money::new("USD", dec!(1), 2).is_ok());
    }

    #[test]
    fn invert_round_trips_within_scale() {
        let rate = ExchangeRate::new("EUR", "USD", dec!(0.900), 3).unwrap();
        let inverted = rate.invert().unwrap();
        assert_eq!(inverted.base(), "USD");
        assert_eq!(inverted.quote(), "EUR");
        assert_eq!(inverted.rate(), dec!(1.111));
    }

    #[test]
    fn convert_rounds_half_up() {
        let rate = ExchangeRate::new("EUR", "USD", dec!(1.111), 3).unwrap();
        let converted = rate.convert(dec!(100), 3).unwrap();
        assert_eq!(converted, dec!(111.100));
    }

    #[test]
    fn money_arithmetic_requires_matching_currency() {
        let a = Money::new("USD", dec!(10), 2).unwrap();
        let b = Money::new("EUR", dec!(10), 2).unwrap();
        assert!(a.add(&b, 2).is_err());
    }
}
