//! Order, asset-pair, and fee-policy value objects.
//!
//! `Order` and `FeePolicy` are the external collaborators the graph builder and
//! materializer consume; their concrete exchange-specific implementations
//! (order-book depth, live fee schedules) are out of scope for this crate and are
//! supplied by the caller.

use crate::decimal::{self, DecimalError};
use crate::money::{ExchangeRate, Money};
use rust_decimal::Decimal;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPair {
    base: String,
    quote: String,
}

impl AssetPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Result<Self, String> {
        let base = base.into();
        let quote = quote.into();
        if base == quote {
            return Err(format!("asset pair base and quote must differ, got {base}/{quote}"));
        }
        Ok(AssetPair { base, quote })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }
}

/// Bounds on the base-currency amount an order is willing to fill.
#[derive(Debug, Clone, Copy)]
pub struct FillBounds {
    pub min: Decimal,
    pub max: Decimal,
}

impl FillBounds {
    pub fn new(min: Decimal, max: Decimal) -> Result<Self, String> {
        if min > max {
            return Err(format!("fill bounds min ({min}) must not exceed max ({max})"));
        }
        Ok(FillBounds { min, max })
    }

    pub fn clamp(&self, amount: Decimal) -> Decimal {
        amount.clamp(self.min, self.max)
    }
}

/// Base/quote fee amounts produced by a [`FeePolicy`] for one fill.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeBreakdown {
    pub base_fee: Decimal,
    pub quote_fee: Decimal,
}

/// External collaborator: computes fees for a single order fill.
///
/// `fingerprint` must return a stable, non-empty identifier distinguishing this
/// policy's configuration; it is used only for deterministic equality checks,
/// never by the search algorithm itself.
pub trait FeePolicy: fmt::Debug {
    fn calculate(&self, side: Side, base_amount: Decimal, quote_amount: Decimal) -> FeeBreakdown;
    fn fingerprint(&self) -> String;
}

/// A fee policy that charges a flat percentage of the quote leg. Grounded in the
/// upstream `FeeConfig` (maker/taker percentage fee applied to the quote side).
#[derive(Debug, Clone, Copy)]
pub struct ProportionalQuoteFee {
    pub rate: Decimal,
}

impl FeePolicy for ProportionalQuoteFee {
    fn calculate(&self, _side: Side, _base_amount: Decimal, quote_amount: Decimal) -> FeeBreakdown {
        FeeBreakdown {
            base_fee: Decimal::ZERO,
            quote_fee: decimal::round(quote_amount * self.rate, 18).expect("scale 18 is always valid"),
        }
    }

    fn fingerprint(&self) -> String {
        format!("proportional-quote:{}", self.rate)
    }
}

/// Result of evaluating an order fill at a chosen base amount. Supplied by the
/// external `OrderFillEvaluator` collaborator.
#[derive(Debug, Clone, Copy)]
pub struct FillResult {
    pub net_base: Decimal,
    pub quote: Decimal,
    pub gross_base: Decimal,
}

/// External collaborator: computes what a given base-amount fill actually
/// produces (net base received/spent, quote counterpart, gross base including
/// base-denominated fees). Purely functional — no side effects, no I/O.
pub trait OrderFillEvaluator {
    fn evaluate(&self, order: &Order, base_amount: Decimal) -> Result<FillResult, DecimalError>;
}

/// Default evaluator: applies the order's own rate and fee policy with no
/// additional market-microstructure effects (no slippage walk). Suitable for
/// orders whose `effective_rate` already reflects the fill price.
#[derive(Debug, Default)]
pub struct LinearFillEvaluator;

impl OrderFillEvaluator for LinearFillEvaluator {
    fn evaluate(&self, order: &Order, base_amount: Decimal) -> Result<FillResult, DecimalError> {
        let quote = order.calculate_quote_amount(base_amount)?;
        let fees = order
            .fee_policy
            .as_ref()
            .map(|p| p.calculate(order.side, base_amount, quote))
            .unwrap_or_default();
        let gross_base = order.calculate_gross_base_spend(base_amount, &fees)?;
        Ok(FillResult {
            net_base: base_amount - fees.base_fee,
            quote: quote - fees.quote_fee,
            gross_base,
        })
    }
}

/// An offer to trade, directional: BUY emits a base→quote graph edge, SELL
/// emits quote→base.
pub struct Order {
    pub id: String,
    pub side: Side,
    pub pair: AssetPair,
    pub bounds: FillBounds,
    pub effective_rate: ExchangeRate,
    pub fee_policy: Option<Box<dyn FeePolicy>>,
}

impl fmt::Debug for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Order")
            .field("id", &self.id)
            .field("side", &self.side)
            .field("pair", &self.pair)
            .field("bounds", &(self.bounds.min, self.bounds.max))
            .finish()
    }
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        side: Side,
        pair: AssetPair,
        bounds: FillBounds,
        effective_rate: ExchangeRate,
        fee_policy: Option<Box<dyn FeePolicy>>,
    ) -> Self {
        Order {
            id: id.into(),
            side,
            pair,
            bounds,
            effective_rate,
            fee_policy,
        }
    }

    /// The currency the graph edge this order produces originates from.
    pub fn edge_from(&self) -> &str {
        match self.side {
            Side::Buy => self.pair.base(),
            Side::Sell => self.pair.quote(),
        }
    }

    /// The currency the graph edge this order produces arrives at.
    pub fn edge_to(&self) -> &str {
        match self.side {
            Side::Buy => self.pair.quote(),
            Side::Sell => self.pair.base(),
        }
    }

    pub fn calculate_quote_amount(&self, base_amount: Decimal) -> Result<Decimal, DecimalError> {
        self.effective_rate.convert(base_amount, self.effective_rate.scale())
    }

    pub fn calculate_gross_base_spend(
        &self,
        net_base: Decimal,
        fees: &FeeBreakdown,
    ) -> Result<Decimal, DecimalError> {
        decimal::round(net_base + fees.base_fee, self.effective_rate.scale())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::ExchangeRate;
    use rust_decimal_macros::dec;

    fn make_order(side: Side, rate: Decimal) -> Order {
        Order::new(
            "o1",
            side,
            AssetPair::new("USD", "EUR").unwrap(),
            FillBounds::new(dec!(10), dec!(200)).unwrap(),
            ExchangeRate::new("USD", "EUR", rate, 3).unwrap(),
            None,
        )
    }

    #[test]
    fn buy_edges_go_base_to_quote() {
        let order = make_order(Side::Buy, dec!(0.9));
        assert_eq!(order.edge_from(), "USD");
        assert_eq!(order.edge_to(), "EUR");
    }

    #[test]
    fn sell_edges_go_quote_to_base() {
        let order = make_order(Side::Sell, dec!(0.9));
        assert_eq!(order.edge_from(), "EUR");
        assert_eq!(order.edge_to(), "USD");
    }

    #[test]
    fn linear_evaluator_applies_fee_policy() {
        let order = Order::new(
            "o2",
            Side::Buy,
            AssetPair::new("USD", "EUR").unwrap(),
            FillBounds::new(dec!(10), dec!(200)).unwrap(),
            ExchangeRate::new("USD", "EUR", dec!(0.9), 3).unwrap(),
            Some(Box::new(ProportionalQuoteFee { rate: dec!(0.01) })),
        );
        let result = LinearFillEvaluator.evaluate(&order, dec!(100)).unwrap();
        assert_eq!(result.gross_base, dec!(100));
        assert!(result.quote < dec!(90));
    }
}
