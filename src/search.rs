//! Priority-driven best-paths search over a [`Graph`].
//!
//! The upstream engine explores its arbitrage graph with an explicit-stack DFS
//! bounded by hop count (`graph_manager.rs::dfs_find_cycles`), collecting every
//! cycle up to the bound and ranking them afterward. This engine instead does
//! incremental best-first expansion: a priority queue keyed by cost, a
//! dominance-pruned per-node state registry, and guard-rail termination. The
//! graph-arena representation and the "log counts on completion" style are kept
//! from the upstream; the traversal itself is new.

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::graph::{Graph, Range};
use crate::money::Money;
use crate::topk::{CandidatePath, DefaultPathOrderStrategy, PathEdge, ResultHeap};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

const TOLERANCE_NINES: &str = "0.999999999999999999";

/// Caller's spend window in the source currency. `desired`, if present, is the
/// preferred spend the engine tries to track through conversions; both `min`
/// and `max` are required (there is no "unbounded spend" mode).
#[derive(Debug, Clone)]
pub struct SpendConstraints {
    pub min: Money,
    pub max: Money,
    pub desired: Option<Money>,
}

impl SpendConstraints {
    pub fn new(min: Money, max: Money, desired: Option<Money>) -> Result<Self, CoreError> {
        if min.amount() > max.amount() {
            return Err(CoreError::InvalidInput(
                "spend constraints: min must not exceed max".into(),
            ));
        }
        if let Some(d) = desired {
            if d.amount() < min.amount() || d.amount() > max.amount() {
                return Err(CoreError::InvalidInput(
                    "spend constraints: desired must lie within [min, max]".into(),
                ));
            }
        }
        Ok(SpendConstraints { min, max, desired })
    }
}

/// Which resource guard(s) terminated the search before the queue drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardLimitStatus {
    pub expansions_reached: bool,
    pub visited_states_reached: bool,
    pub time_reached: bool,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub paths: Vec<CandidatePath>,
    pub guard_limits: GuardLimitStatus,
}

#[derive(Clone)]
struct SearchState {
    node: String,
    cost: Decimal,
    product: Decimal,
    hops: u32,
    path: Vec<PathEdge>,
    amount_range: Option<Range>,
    desired_amount: Option<Decimal>,
    visited: HashSet<String>,
    insertion_order: u64,
}

/// Wraps a `SearchState` for the priority queue. `BinaryHeap` is a max-heap;
/// we want the smallest `cost` popped first, with ties broken by the larger
/// (later) `insertion_order` winning, per the design note's documented PQ
/// polarity. A standard ascending tie-break would also satisfy the
/// determinism property for a fixed engine; this crate keeps the documented
/// polarity for fidelity to the design notes.
struct PqEntry(SearchState);

impl PartialEq for PqEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.cost == other.0.cost && self.0.insertion_order == other.0.insertion_order
    }
}
impl Eq for PqEntry {}

impl PartialOrd for PqEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PqEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse cost so the smallest cost is the heap maximum (pops first).
        other
            .0
            .cost
            .cmp(&self.0.cost)
            .then_with(|| self.0.insertion_order.cmp(&other.0.insertion_order))
    }
}

struct Record {
    cost: Decimal,
    hops: u32,
    signature: String,
}

#[derive(Default)]
struct StateRegistry {
    by_node: HashMap<String, Vec<Record>>,
}

impl StateRegistry {
    fn is_dominated(&self, node: &str, cost: Decimal, hops: u32, signature: &str) -> bool {
        self.by_node
            .get(node)
            .map(|records| {
                records
                    .iter()
                    .any(|r| r.signature == signature && r.cost <= cost && r.hops <= hops)
            })
            .unwrap_or(false)
    }

    fn has_signature(&self, node: &str, signature: &str) -> bool {
        self.by_node
            .get(node)
            .map(|records| records.iter().any(|r| r.signature == signature))
            .unwrap_or(false)
    }

    /// Returns the net change in live-state count: `1 - evicted`.
    fn register(&mut self, node: &str, cost: Decimal, hops: u32, signature: String) -> i64 {
        let records = self.by_node.entry(node.to_string()).or_default();
        let before = records.len();
        records.retain(|r| !(r.signature == signature && cost <= r.cost && hops <= r.hops));
        let evicted = (before - records.len()) as i64;
        records.push(Record { cost, hops, signature });
        1 - evicted
    }
}

/// `order_ref` is the order whose edge produced this state (the edge just
/// traversed). Folding it in keeps dominance scoped to "the same subproblem
/// reached via the same order" rather than collapsing distinct sibling orders
/// between the same currencies — without a spend range, `range`/`desired` are
/// both `None` for every edge out of a node, so `order_ref` is the only thing
/// that tells two offers apart.
fn state_signature(range: Option<Range>, desired: Option<Decimal>, order_ref: usize) -> String {
    let range_part = range
        .map(|r| format!("{}:{}", r.min, r.max))
        .unwrap_or_else(|| "null".to_string());
    let desired_part = desired.map(|d| d.to_string()).unwrap_or_else(|| "null".to_string());
    format!("{range_part}|{desired_part}|{order_ref}")
}

/// `1` when `tolerance == 0`; otherwise `1 / (1 - tolerance)` after clamping
/// tolerance to 18 nines.
fn tolerance_amplifier(tolerance: Decimal) -> Decimal {
    let ceiling: Decimal = TOLERANCE_NINES.parse().expect("constant parses");
    let t = tolerance.min(ceiling);
    if t.is_zero() {
        Decimal::ONE
    } else {
        Decimal::ONE / (Decimal::ONE - t)
    }
}

/// Affine interpolation of `value` from `source` range into `target` range,
/// clamping the input and the output.
fn affine(value: Decimal, source: Range, target: Range) -> Decimal {
    let clamped = value.clamp(source.min, source.max);
    if source.max == source.min {
        return target.min;
    }
    let ratio = (clamped - source.min) / (source.max - source.min);
    let raw = target.min + ratio * (target.max - target.min);
    raw.clamp(target.min, target.max)
}

fn intersect(range: Range, capacity: Range) -> Option<Range> {
    let min = range.min.max(capacity.min);
    let max = range.max.min(capacity.max);
    if min > max {
        None
    } else {
        Some(Range::new(min, max))
    }
}

/// Validated, immutable search engine. Construct once per `EngineConfig`, then
/// call [`SearchEngine::find_best_paths`] as many times as needed against
/// different graphs — the engine itself holds no mutable search-time state.
pub struct SearchEngine {
    config: EngineConfig,
}

impl SearchEngine {
    pub fn new(config: EngineConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(SearchEngine { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn find_best_paths(
        &self,
        graph: &Graph,
        source: &str,
        target: &str,
        spend_constraints: Option<&SpendConstraints>,
        accept_candidate: Option<&dyn Fn(&CandidatePath) -> bool>,
    ) -> SearchOutcome {
        let source = source.to_uppercase();
        let target = target.to_uppercase();

        if !graph.has_node(&source) || !graph.has_node(&target) {
            return SearchOutcome {
                paths: Vec::new(),
                guard_limits: GuardLimitStatus::default(),
            };
        }

        let started_at = Instant::now();
        let amplifier = tolerance_amplifier(self.config.tolerance);

        let mut insertion_counter: u64 = 0;
        let mut visited_states: u64 = 0;
        let mut expansions: u64 = 0;
        let mut guard_limits = GuardLimitStatus::default();
        let mut best_target_cost: Option<Decimal> = None;

        let mut registry = StateRegistry::default();
        let mut heap: BinaryHeap<PqEntry> = BinaryHeap::new();
        let mut results = ResultHeap::new(self.config.top_k);

        let initial_range = spend_constraints.map(|c| Range::new(c.min.amount(), c.max.amount()));
        let initial_desired = spend_constraints.and_then(|c| c.desired.map(|d| d.amount()));

        let mut initial_visited = HashSet::new();
        initial_visited.insert(source.clone());

        heap.push(PqEntry(SearchState {
            node: source.clone(),
            cost: Decimal::ONE,
            product: Decimal::ONE,
            hops: 0,
            path: Vec::new(),
            amount_range: initial_range,
            desired_amount: initial_desired,
            visited: initial_visited,
            insertion_order: insertion_counter,
        }));
        insertion_counter += 1;

        loop {
            if let Some(budget_ms) = self.config.time_budget_ms {
                if started_at.elapsed().as_millis() as u64 >= budget_ms {
                    guard_limits.time_reached = true;
                    break;
                }
            }
            if expansions >= self.config.max_expansions {
                guard_limits.expansions_reached = true;
                break;
            }
            let Some(PqEntry(state)) = heap.pop() else {
                break;
            };
            expansions += 1;

            if state.node == target {
                // The tolerance envelope (Testable Property: every emitted path's
                // cost <= best_cost * 1/(1-tolerance)) is an invariant of the final
                // output set, not just of states still being expanded — a
                // same-hop-count sibling edge can land on the target before the
                // true best has been popped, so the check is re-applied here.
                if let Some(best) = best_target_cost {
                    if state.cost > best * amplifier {
                        continue;
                    }
                }
                let candidate = CandidatePath {
                    cost: state.cost,
                    product: state.product,
                    hops: state.hops,
                    edges: state.path.clone(),
                    amount_range: state.amount_range,
                    desired_amount: state.desired_amount,
                };
                let accepted = accept_candidate.map(|f| f(&candidate)).unwrap_or(true);
                if accepted {
                    best_target_cost = Some(match best_target_cost {
                        Some(existing) => existing.min(candidate.cost),
                        None => candidate.cost,
                    });
                    results.push(candidate, insertion_counter);
                    insertion_counter += 1;
                }
                continue;
            }

            if state.hops >= self.config.max_hops {
                continue;
            }

            for edge in graph.edges_from(&state.node) {
                if state.visited.contains(&edge.to) {
                    continue;
                }
                let conversion_rate = edge.conversion_rate();
                if conversion_rate <= Decimal::ZERO {
                    continue;
                }

                let (next_range, next_desired) = match state.amount_range {
                    Some(range) => {
                        let feasible = match intersect(range, edge.source_capacity()) {
                            Some(r) => r,
                            None => continue,
                        };
                        let clamped_desired = state
                            .desired_amount
                            .map(|d| d.clamp(feasible.min, feasible.max));
                        let next_desired =
                            clamped_desired.map(|d| affine(d, edge.source_capacity(), edge.target_capacity()));
                        let next_min = affine(feasible.min, edge.source_capacity(), edge.target_capacity());
                        let next_max = affine(feasible.max, edge.source_capacity(), edge.target_capacity());
                        (Some(Range::new(next_min, next_max)), next_desired)
                    }
                    None => {
                        let next_desired = state
                            .desired_amount
                            .map(|d| affine(d, edge.source_capacity(), edge.target_capacity()));
                        (None, next_desired)
                    }
                };

                let next_cost = state.cost / conversion_rate;
                let next_product = state.product * conversion_rate;
                let next_hops = state.hops + 1;
                let signature = state_signature(next_range, next_desired, edge.order_ref);

                if registry.is_dominated(&edge.to, next_cost, next_hops, &signature) {
                    continue;
                }

                if visited_states >= self.config.max_visited_states
                    && !registry.has_signature(&edge.to, &signature)
                {
                    guard_limits.visited_states_reached = true;
                    continue;
                }

                if let Some(best) = best_target_cost {
                    let max_allowed = best * amplifier;
                    if next_cost > max_allowed {
                        continue;
                    }
                }

                let delta = registry.register(&edge.to, next_cost, next_hops, signature);
                visited_states = (visited_states as i64 + delta).max(0) as u64;

                let mut next_visited = state.visited.clone();
                next_visited.insert(edge.to.clone());
                let mut next_path = state.path.clone();
                next_path.push(PathEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    order_ref: edge.order_ref,
                    rate: edge.rate,
                    side: edge.side,
                    conversion_rate,
                });

                heap.push(PqEntry(SearchState {
                    node: edge.to.clone(),
                    cost: next_cost,
                    product: next_product,
                    hops: next_hops,
                    path: next_path,
                    amount_range: next_range,
                    desired_amount: next_desired,
                    visited: next_visited,
                    insertion_order: insertion_counter,
                }));
                insertion_counter += 1;
            }
        }

        debug!(
            expansions,
            visited_states,
            queue_remaining = heap.len(),
            "search loop terminated"
        );

        let strategy = self
            .config
            .ordering_strategy
            .clone()
            .unwrap_or_else(|| std::sync::Arc::new(DefaultPathOrderStrategy));
        let paths = results.into_sorted(strategy.as_ref());

        info!(
            expansions,
            visited_states,
            found = paths.len(),
            expansions_reached = guard_limits.expansions_reached,
            visited_states_reached = guard_limits.visited_states_reached,
            time_reached = guard_limits.time_reached,
            "find_best_paths completed"
        );

        SearchOutcome { paths, guard_limits }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::money::ExchangeRate;
    use crate::order::{AssetPair, FillBounds, LinearFillEvaluator, Order, Side};
    use rust_decimal_macros::dec;

    fn sell(id: &str, base: &str, quote: &str, rate: Decimal, min: Decimal, max: Decimal) -> Order {
        Order::new(
            id,
            Side::Sell,
            AssetPair::new(base, quote).unwrap(),
            FillBounds::new(min, max).unwrap(),
            ExchangeRate::new(base, quote, rate, 6).unwrap(),
            None,
        )
    }

    fn buy(id: &str, base: &str, quote: &str, rate: Decimal, min: Decimal, max: Decimal) -> Order {
        Order::new(
            id,
            Side::Buy,
            AssetPair::new(base, quote).unwrap(),
            FillBounds::new(min, max).unwrap(),
            ExchangeRate::new(base, quote, rate, 6).unwrap(),
            None,
        )
    }

    #[test]
    fn direct_single_hop_path_is_found() {
        // S1: SELL USD/EUR rate 0.9, spend EUR 100, exact tolerance.
        let orders = vec![sell("o1", "USD", "EUR", dec!(0.900000), dec!(10), dec!(200))];
        let graph = GraphBuilder::build(&orders, &LinearFillEvaluator).unwrap();
        let engine = SearchEngine::new(EngineConfig {
            max_hops: 1,
            ..EngineConfig::default()
        })
        .unwrap();
        let outcome = engine.find_best_paths(&graph, "EUR", "USD", None, None);
        assert_eq!(outcome.paths.len(), 1);
        assert_eq!(outcome.paths[0].hops, 1);
        assert_eq!(outcome.paths[0].route_signature(), "EUR-0->USD");
    }

    #[test]
    fn unknown_source_returns_empty_outcome() {
        let orders = vec![sell("o1", "USD", "EUR", dec!(0.9), dec!(10), dec!(200))];
        let graph = GraphBuilder::build(&orders, &LinearFillEvaluator).unwrap();
        let engine = SearchEngine::new(EngineConfig::default()).unwrap();
        let outcome = engine.find_best_paths(&graph, "ZZZ", "USD", None, None);
        assert!(outcome.paths.is_empty());
        assert_eq!(outcome.guard_limits, GuardLimitStatus::default());
    }

    #[test]
    fn two_hop_bridge_is_preferred_over_no_path() {
        // S2: EUR -> USD -> JPY bridge.
        let orders = vec![
            sell("o1", "USD", "EUR", dec!(0.900000), dec!(10), dec!(200)),
            buy("o2", "USD", "JPY", dec!(150.000000), dec!(50), dec!(200)),
        ];
        let graph = GraphBuilder::build(&orders, &LinearFillEvaluator).unwrap();
        let engine = SearchEngine::new(EngineConfig {
            max_hops: 3,
            ..EngineConfig::default()
        })
        .unwrap();
        let outcome = engine.find_best_paths(&graph, "EUR", "JPY", None, None);
        assert_eq!(outcome.paths.len(), 1);
        assert_eq!(outcome.paths[0].route_signature(), "EUR-0->USD-1->JPY");
    }

    #[test]
    fn expansion_guard_can_terminate_search_early() {
        let orders = vec![sell("o1", "USD", "EUR", dec!(0.9), dec!(10), dec!(200))];
        let graph = GraphBuilder::build(&orders, &LinearFillEvaluator).unwrap();
        let engine = SearchEngine::new(EngineConfig {
            max_expansions: 1,
            ..EngineConfig::default()
        })
        .unwrap();
        let outcome = engine.find_best_paths(&graph, "EUR", "USD", None, None);
        assert!(outcome.guard_limits.expansions_reached);
    }

    #[test]
    fn results_respect_top_k_bound() {
        let orders = vec![
            sell("o1", "USDT", "RUB", dec!(95.000000), dec!(1), dec!(100)),
            sell("o2", "USDT", "RUB", dec!(100.000000), dec!(1), dec!(100)),
            sell("o3", "USDT", "RUB", dec!(105.000000), dec!(1), dec!(100)),
        ];
        let graph = GraphBuilder::build(&orders, &LinearFillEvaluator).unwrap();
        let engine = SearchEngine::new(EngineConfig {
            top_k: 2,
            max_hops: 1,
            tolerance: dec!(0.2),
            ..EngineConfig::default()
        })
        .unwrap();
        let outcome = engine.find_best_paths(&graph, "RUB", "USDT", None, None);
        assert_eq!(outcome.paths.len(), 2);
        assert!(outcome.paths[0].cost <= outcome.paths[1].cost);
    }
}
