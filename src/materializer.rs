//! Converts an abstract [`CandidatePath`] into concrete per-leg spend/receive
//! amounts.
//!
//! Grounded on the upstream `SlippageCalculator::calculate_path`
//! (`slippage.rs`): a leg-by-leg walk maintaining a running amount, per-leg
//! side handling, and a descriptive rejection reason on failure. The SELL-leg
//! fixed-point refinement and the final tolerance-window check are new,
//! implementing semantics the upstream (a simple linear slippage walk) never
//! needed because its fees were flat and amount-independent.

use crate::decimal;
use crate::money::Money;
use crate::order::{FeeBreakdown, Order, Side};
use crate::tolerance::{self, ToleranceWindow};
use crate::topk::CandidatePath;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

const MAX_SELL_ITERATIONS: u32 = 16;
const SELL_CONVERGENCE_TOLERANCE: &str = "0.000001";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("leg {leg} ({order_id}): SELL refinement did not converge within {iterations} iterations")]
    NonConvergent {
        leg: usize,
        order_id: String,
        iterations: u32,
    },
    #[error("leg {leg} ({order_id}): resulting fill {amount} falls outside order bounds [{min}, {max}]")]
    OutOfBounds {
        leg: usize,
        order_id: String,
        amount: Decimal,
        min: Decimal,
        max: Decimal,
    },
    #[error("leg {leg} ({order_id}): quote amount collapsed to zero or flipped sign during refinement")]
    DegenerateQuote { leg: usize, order_id: String },
    #[error("residual {residual} outside the accepted tolerance window")]
    ToleranceViolation { residual: Decimal },
    #[error("decimal error materializing leg {leg}: {source}")]
    Decimal {
        leg: usize,
        source: crate::decimal::DecimalError,
    },
    #[error("currency error materializing leg {leg}: {source}")]
    Currency { leg: usize, source: String },
}

/// One concrete leg of a materialized path.
#[derive(Debug, Clone)]
pub struct MaterializedLeg {
    pub order_id: String,
    pub side: Side,
    pub spent: Money,
    pub received: Money,
    pub fees: FeeBreakdown,
}

/// The fully materialized result of a candidate path.
#[derive(Debug, Clone)]
pub struct PathResult {
    pub requested: Money,
    pub actual_gross_spent: Money,
    pub received: Money,
    pub legs: Vec<MaterializedLeg>,
    pub residual: Decimal,
}

pub struct Materializer<'a> {
    orders: &'a [Order],
}

impl<'a> Materializer<'a> {
    pub fn new(orders: &'a [Order]) -> Self {
        Materializer { orders }
    }

    pub fn materialize(
        &self,
        candidate: &CandidatePath,
        requested: Money,
        window: ToleranceWindow,
    ) -> Result<PathResult, MaterializeError> {
        let mut legs = Vec::with_capacity(candidate.edges.len());
        let mut current = requested;

        for (leg_idx, edge) in candidate.edges.iter().enumerate() {
            let order = &self.orders[edge.order_ref];
            let leg = match order.side {
                Side::Buy => self.materialize_buy_leg(leg_idx, order, current)?,
                Side::Sell => self.materialize_sell_leg(leg_idx, order, current)?,
            };
            current = leg.received;
            legs.push(leg);
        }

        let actual_gross_spent = legs
            .first()
            .map(|l| l.spent)
            .unwrap_or(requested);

        let residual = match tolerance::within_window(
            requested.amount(),
            actual_gross_spent.amount(),
            window,
        ) {
            Ok(r) => r,
            Err(r) => {
                warn!(
                    route = %candidate.route_signature(),
                    residual = %r,
                    "materialized path rejected: outside tolerance window"
                );
                return Err(MaterializeError::ToleranceViolation { residual: r });
            }
        };

        Ok(PathResult {
            requested,
            actual_gross_spent,
            received: current,
            legs,
            residual,
        })
    }

    fn materialize_buy_leg(
        &self,
        leg_idx: usize,
        order: &Order,
        current: Money,
    ) -> Result<MaterializedLeg, MaterializeError> {
        let net_base = order.bounds.clamp(current.amount());
        let raw_quote = order
            .calculate_quote_amount(net_base)
            .map_err(|e| MaterializeError::Decimal { leg: leg_idx, source: e })?;
        let fees = order
            .fee_policy
            .as_ref()
            .map(|p| p.calculate(Side::Buy, net_base, raw_quote))
            .unwrap_or_default();
        let received_amount = raw_quote - fees.quote_fee;
        let spent_amount = order
            .calculate_gross_base_spend(net_base, &fees)
            .map_err(|e| MaterializeError::Decimal { leg: leg_idx, source: e })?;

        if spent_amount < order.bounds.min || net_base > order.bounds.max {
            return Err(MaterializeError::OutOfBounds {
                leg: leg_idx,
                order_id: order.id.clone(),
                amount: net_base,
                min: order.bounds.min,
                max: order.bounds.max,
            });
        }

        let scale = order.effective_rate.scale();
        let spent = Money::new(order.edge_from(), spent_amount, scale)
            .map_err(|e| MaterializeError::Currency { leg: leg_idx, source: e.to_string() })?;
        let received = Money::new(order.edge_to(), received_amount, scale)
            .map_err(|e| MaterializeError::Currency { leg: leg_idx, source: e.to_string() })?;

        Ok(MaterializedLeg {
            order_id: order.id.clone(),
            side: Side::Buy,
            spent,
            received,
            fees,
        })
    }

    fn materialize_sell_leg(
        &self,
        leg_idx: usize,
        order: &Order,
        current: Money,
    ) -> Result<MaterializedLeg, MaterializeError> {
        let target = current.amount();
        let scale = order.effective_rate.scale();
        let convergence: Decimal = SELL_CONVERGENCE_TOLERANCE.parse().expect("constant parses");

        let inverted = order
            .effective_rate
            .invert()
            .map_err(|e| MaterializeError::Decimal { leg: leg_idx, source: e })?;
        let mut base_amount = inverted
            .convert(target, scale)
            .map_err(|e| MaterializeError::Decimal { leg: leg_idx, source: e })?;

        let mut converged_quote = None;

        for _ in 0..MAX_SELL_ITERATIONS {
            let raw_quote = order
                .calculate_quote_amount(base_amount)
                .map_err(|e| MaterializeError::Decimal { leg: leg_idx, source: e })?;
            let fees = order
                .fee_policy
                .as_ref()
                .map(|p| p.calculate(Side::Sell, base_amount, raw_quote))
                .unwrap_or_default();
            let effective_quote = raw_quote - fees.quote_fee;

            if effective_quote.is_zero() || effective_quote.signum() != target.signum() {
                return Err(MaterializeError::DegenerateQuote {
                    leg: leg_idx,
                    order_id: order.id.clone(),
                });
            }

            let rel_err = decimal::round((effective_quote - target).abs() / target.abs(), 18)
                .map_err(|e| MaterializeError::Decimal { leg: leg_idx, source: e })?;
            if rel_err <= convergence {
                converged_quote = Some((effective_quote, fees));
                break;
            }

            let ratio = target / effective_quote;
            base_amount = decimal::round(base_amount * ratio, scale)
                .map_err(|e| MaterializeError::Decimal { leg: leg_idx, source: e })?;
        }

        let (effective_quote, fees) = match converged_quote {
            Some(v) => v,
            None => {
                return Err(MaterializeError::NonConvergent {
                    leg: leg_idx,
                    order_id: order.id.clone(),
                    iterations: MAX_SELL_ITERATIONS,
                })
            }
        };

        if base_amount < order.bounds.min || base_amount > order.bounds.max {
            return Err(MaterializeError::OutOfBounds {
                leg: leg_idx,
                order_id: order.id.clone(),
                amount: base_amount,
                min: order.bounds.min,
                max: order.bounds.max,
            });
        }

        let spent = Money::new(order.edge_from(), effective_quote, scale)
            .map_err(|e| MaterializeError::Currency { leg: leg_idx, source: e.to_string() })?;
        let received = Money::new(order.edge_to(), base_amount, scale)
            .map_err(|e| MaterializeError::Currency { leg: leg_idx, source: e.to_string() })?;

        Ok(MaterializedLeg {
            order_id: order.id.clone(),
            side: Side::Sell,
            spent,
            received,
            fees,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::ExchangeRate;
    use crate::order::{AssetPair, FillBounds};
    use crate::topk::PathEdge;
    use rust_decimal_macros::dec;

    fn sell_order(id: &str, base: &str, quote: &str, rate: Decimal) -> Order {
        Order::new(
            id,
            Side::Sell,
            AssetPair::new(base, quote).unwrap(),
            FillBounds::new(dec!(1), dec!(10_000)).unwrap(),
            ExchangeRate::new(base, quote, rate, 3).unwrap(),
            None,
        )
    }

    fn candidate_for(order_ref: usize, from: &str, to: &str, side: Side, rate: Decimal) -> CandidatePath {
        CandidatePath {
            cost: Decimal::ONE,
            product: Decimal::ONE,
            hops: 1,
            edges: vec![PathEdge {
                from: from.into(),
                to: to.into(),
                order_ref,
                rate,
                side,
                conversion_rate: rate,
            }],
            amount_range: None,
            desired_amount: None,
        }
    }

    #[test]
    fn s1_direct_sell_leg_with_no_fees() {
        // SELL USD/EUR rate 0.900, spend EUR 100 -> USD received 111.111.
        let orders = vec![sell_order("o1", "USD", "EUR", dec!(0.900))];
        let candidate = candidate_for(0, "EUR", "USD", Side::Sell, dec!(0.900));
        let requested = Money::new("EUR", dec!(100), 3).unwrap();
        let result = Materializer::new(&orders)
            .materialize(&candidate, requested, ToleranceWindow::exact())
            .unwrap();
        assert_eq!(result.received.currency(), "USD");
        assert_eq!(result.received.amount(), dec!(111.111));
        assert_eq!(result.residual, dec!(0));
    }

    #[test]
    fn out_of_bounds_sell_is_rejected() {
        let orders = vec![Order::new(
            "o1",
            Side::Sell,
            AssetPair::new("USD", "EUR").unwrap(),
            FillBounds::new(dec!(10), dec!(50)).unwrap(),
            ExchangeRate::new("USD", "EUR", dec!(0.9), 3).unwrap(),
            None,
        )];
        let candidate = candidate_for(0, "EUR", "USD", Side::Sell, dec!(0.9));
        let requested = Money::new("EUR", dec!(100), 3).unwrap();
        let result = Materializer::new(&orders).materialize(&candidate, requested, ToleranceWindow::exact());
        assert!(matches!(result, Err(MaterializeError::OutOfBounds { .. })));
    }
}
