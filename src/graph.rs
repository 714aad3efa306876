//! Capacitated order graph and its builder.
//!
//! The graph is represented as an arena of nodes plus a currency→index map,
//! following the upstream `PersistentGraph`'s `DiGraph<String, _>` +
//! `node_map: HashMap<String, NodeIndex>` shape (`graph_manager.rs`). Unlike the
//! upstream graph, this one is built once per search call from a pure function —
//! there is no live-feed incremental update path, since the core's lifecycle is
//! "construct, search, discard."

use crate::error::CoreError;
use crate::order::{AssetPair, Order, OrderFillEvaluator, Side};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

fn currency_is_valid(code: &str) -> bool {
    let len = code.len();
    (3..=12).contains(&len) && code.chars().all(|c| c.is_ascii_uppercase())
}

/// An inclusive `[min, max]` interval, `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub min: Decimal,
    pub max: Decimal,
}

impl Range {
    pub fn new(min: Decimal, max: Decimal) -> Self {
        debug_assert!(min <= max);
        Range { min, max }
    }

    pub fn width(&self) -> Decimal {
        self.max - self.min
    }

    pub fn degenerate_zero() -> Self {
        Range::new(Decimal::ZERO, Decimal::ZERO)
    }
}

/// One of at most two feasible-spend slices of an order, mandatory (must be
/// taken to use the edge at all) or optional (discretionary, may contribute
/// zero).
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub mandatory: bool,
    pub base_range: Range,
    pub quote_range: Range,
    pub gross_base_range: Range,
}

/// A directed, capacitated edge derived from one order.
#[derive(Debug)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub side: Side,
    pub order_ref: usize,
    pub rate: Decimal,
    pub base_capacity: Range,
    pub quote_capacity: Range,
    pub gross_base_capacity: Range,
    pub segments: Vec<Segment>,
}

impl GraphEdge {
    /// `quote_capacity.max / source_capacity.max` where `source_capacity` is
    /// `gross_base_capacity` for BUY and `base_capacity` for SELL (the currency
    /// the edge actually consumes on its `from` side). BUY exposes this ratio
    /// directly; SELL exposes its reciprocal, since a SELL edge consumes quote
    /// and produces base.
    pub fn conversion_rate(&self) -> Decimal {
        match self.side {
            Side::Buy => {
                if self.gross_base_capacity.max.is_zero() {
                    Decimal::ZERO
                } else {
                    self.quote_capacity.max / self.gross_base_capacity.max
                }
            }
            Side::Sell => {
                if self.quote_capacity.max.is_zero() {
                    Decimal::ZERO
                } else {
                    self.base_capacity.max / self.quote_capacity.max
                }
            }
        }
    }

    /// The aggregated feasible interval on the edge's `from`-side currency:
    /// `gross_base_capacity` for BUY (source is base), `quote_capacity` for
    /// SELL (source is quote).
    pub fn source_capacity(&self) -> Range {
        match self.side {
            Side::Buy => self.gross_base_capacity,
            Side::Sell => self.quote_capacity,
        }
    }

    /// The aggregated feasible interval on the edge's `to`-side currency.
    pub fn target_capacity(&self) -> Range {
        match self.side {
            Side::Buy => self.quote_capacity,
            Side::Sell => self.base_capacity,
        }
    }
}

/// Capacitated directed graph: `map<currency -> {currency, edges}>`, realized as
/// a petgraph arena plus a currency→index lookup.
pub struct Graph {
    graph: DiGraph<String, GraphEdge>,
    node_map: HashMap<String, NodeIndex>,
}

impl Graph {
    fn empty() -> Self {
        Graph {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    fn node_for(&mut self, currency: &str) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(currency) {
            return idx;
        }
        let idx = self.graph.add_node(currency.to_string());
        self.node_map.insert(currency.to_string(), idx);
        idx
    }

    pub fn has_node(&self, currency: &str) -> bool {
        self.node_map.contains_key(currency)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Outgoing edges from `currency`, in the arena's own edge order (stable
    /// for a fixed graph; the search is order-invariant by design, §8). Empty
    /// if the currency is unknown. O(degree) via petgraph's adjacency list,
    /// not a linear scan over every edge in the graph.
    pub fn edges_from(&self, currency: &str) -> impl Iterator<Item = &GraphEdge> {
        self.node_map
            .get(currency)
            .into_iter()
            .flat_map(move |&idx| self.graph.edges(idx).map(|e| e.weight()))
    }

    /// All currencies reachable from `currency` by at least one directed edge,
    /// including `currency` itself if it has an outgoing self-loop. Diagnostic
    /// helper, not used by the search itself.
    pub fn connected_currencies(&self, currency: &str) -> Vec<String> {
        self.edges_from(currency).map(|e| e.to.clone()).collect()
    }

    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(|s| s.as_str())
    }
}

/// Builds a [`Graph`] from an order list. Pure and stateless: every call
/// produces an independent graph, matching the core's per-search lifecycle.
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn build(
        orders: &[Order],
        evaluator: &dyn OrderFillEvaluator,
    ) -> Result<Graph, CoreError> {
        let mut graph = Graph::empty();

        for (idx, order) in orders.iter().enumerate() {
            validate_pair(&order.pair)?;

            let min_fill = evaluator
                .evaluate(order, order.bounds.min)
                .map_err(|e| CoreError::Precision(e.to_string()))?;
            let max_fill = evaluator
                .evaluate(order, order.bounds.max)
                .map_err(|e| CoreError::Precision(e.to_string()))?;

            let base_capacity = Range::new(min_fill.net_base, max_fill.net_base);
            let quote_capacity = Range::new(min_fill.quote, max_fill.quote);
            let gross_base_capacity = Range::new(min_fill.gross_base, max_fill.gross_base);

            let mut segments = Vec::with_capacity(2);
            if !base_capacity.min.is_zero() {
                segments.push(Segment {
                    mandatory: true,
                    base_range: Range::new(base_capacity.min, base_capacity.min),
                    quote_range: Range::new(quote_capacity.min, quote_capacity.min),
                    gross_base_range: Range::new(gross_base_capacity.min, gross_base_capacity.min),
                });
            }
            let base_width = base_capacity.width();
            if !base_width.is_zero() {
                segments.push(Segment {
                    mandatory: false,
                    base_range: Range::new(Decimal::ZERO, base_width),
                    quote_range: Range::new(Decimal::ZERO, quote_capacity.width()),
                    gross_base_range: Range::new(Decimal::ZERO, gross_base_capacity.width()),
                });
            }
            if segments.is_empty() {
                segments.push(Segment {
                    mandatory: false,
                    base_range: Range::degenerate_zero(),
                    quote_range: Range::degenerate_zero(),
                    gross_base_range: Range::degenerate_zero(),
                });
            }

            let from = order.edge_from().to_string();
            let to = order.edge_to().to_string();
            let from_idx = graph.node_for(&from);
            let to_idx = graph.node_for(&to);

            let edge = GraphEdge {
                from,
                to,
                side: order.side,
                order_ref: idx,
                rate: order.effective_rate.rate(),
                base_capacity,
                quote_capacity,
                gross_base_capacity,
                segments,
            };
            graph.graph.add_edge(from_idx, to_idx, edge);
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built order graph"
        );
        Ok(graph)
    }
}

fn validate_pair(pair: &AssetPair) -> Result<(), CoreError> {
    if !currency_is_valid(pair.base()) {
        return Err(CoreError::InvalidInput(format!(
            "currency '{}' must be 3-12 uppercase ASCII letters",
            pair.base()
        )));
    }
    if !currency_is_valid(pair.quote()) {
        return Err(CoreError::InvalidInput(format!(
            "currency '{}' must be 3-12 uppercase ASCII letters",
            pair.quote()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::ExchangeRate;
    use crate::order::{FillBounds, LinearFillEvaluator};
    use rust_decimal_macros::dec;

    fn sell_order(id: &str, base: &str, quote: &str, rate: Decimal, min: Decimal, max: Decimal) -> Order {
        Order::new(
            id,
            Side::Sell,
            AssetPair::new(base, quote).unwrap(),
            FillBounds::new(min, max).unwrap(),
            ExchangeRate::new(base, quote, rate, 6).unwrap(),
            None,
        )
    }

    #[test]
    fn builds_nodes_and_edges_for_each_order() {
        let orders = vec![sell_order("o1", "USD", "EUR", dec!(0.900000), dec!(10), dec!(200))];
        let graph = GraphBuilder::build(&orders, &LinearFillEvaluator).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.has_node("USD"));
        assert!(graph.has_node("EUR"));
        let edges: Vec<_> = graph.edges_from("EUR").collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to, "USD");
    }

    #[test]
    fn segments_split_into_mandatory_and_optional() {
        let orders = vec![sell_order("o1", "USD", "EUR", dec!(0.900000), dec!(10), dec!(200))];
        let graph = GraphBuilder::build(&orders, &LinearFillEvaluator).unwrap();
        let edge = graph.edges_from("EUR").next().unwrap();
        assert_eq!(edge.segments.len(), 2);
        assert!(edge.segments[0].mandatory);
        assert!(!edge.segments[1].mandatory);
    }

    #[test]
    fn rejects_malformed_currency_code() {
        let orders = vec![sell_order("o1", "US", "EUR", dec!(1), dec!(1), dec!(2))];
        assert!(GraphBuilder::build(&orders, &LinearFillEvaluator).is_err());
    }
}
