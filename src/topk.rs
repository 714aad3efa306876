//! Candidate path representation, the bounded top-K result heap, and final
//! stable ordering.
//!
//! Grounded loosely on the upstream `PersistentGraph::scan` pattern of
//! collecting candidates, deduplicating by path string, and sorting by
//! profitability (`graph_manager.rs`) — generalized here to a capacity-bounded
//! heap with an injectable ordering strategy and signature-based dedup.

use crate::graph::Range;
use crate::order::Side;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

/// One traversed edge in a materialized or candidate path.
#[derive(Debug, Clone)]
pub struct PathEdge {
    pub from: String,
    pub to: String,
    pub order_ref: usize,
    pub rate: Decimal,
    pub side: Side,
    pub conversion_rate: Decimal,
}

/// A terminal search-state snapshot: a complete path from source to target.
#[derive(Debug, Clone)]
pub struct CandidatePath {
    pub cost: Decimal,
    pub product: Decimal,
    pub hops: u32,
    pub edges: Vec<PathEdge>,
    pub amount_range: Option<Range>,
    pub desired_amount: Option<Decimal>,
}

impl CandidatePath {
    /// `n0-order0->n1-order1->...->nN`, built from the edge chain. The order
    /// reference is folded into each hop (not just the currency sequence) so
    /// that two distinct orders between the same currency pair are treated as
    /// distinct routes rather than deduplicated away.
    pub fn route_signature(&self) -> String {
        if self.edges.is_empty() {
            return String::new();
        }
        let mut sig = self.edges[0].from.clone();
        for edge in &self.edges {
            sig.push('-');
            sig.push_str(&edge.order_ref.to_string());
            sig.push_str("->");
            sig.push_str(&edge.to);
        }
        sig
    }
}

/// The stable key used to order final results.
#[derive(Debug, Clone)]
pub struct PathOrderKey {
    pub cost: Decimal,
    pub hops: u32,
    pub route_signature: String,
    pub insertion_order: u64,
}

/// Injectable final-ordering comparator, consumed by the engine's result
/// finalization step (§4.5).
pub trait PathOrderStrategy: Send + Sync {
    fn compare(&self, a: &PathOrderKey, b: &PathOrderKey) -> Ordering;
}

/// `cost` ascending, then `hops` ascending, then `route_signature`
/// lexicographically, then `insertion_order` ascending.
#[derive(Debug, Default)]
pub struct DefaultPathOrderStrategy;

impl PathOrderStrategy for DefaultPathOrderStrategy {
    fn compare(&self, a: &PathOrderKey, b: &PathOrderKey) -> Ordering {
        a.cost
            .cmp(&b.cost)
            .then_with(|| a.hops.cmp(&b.hops))
            .then_with(|| a.route_signature.cmp(&b.route_signature))
            .then_with(|| a.insertion_order.cmp(&b.insertion_order))
    }
}

struct ResultEntry {
    cost: Decimal,
    insertion_order: u64,
    path: CandidatePath,
}

impl fmt::Debug for ResultEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultEntry")
            .field("cost", &self.cost)
            .field("insertion_order", &self.insertion_order)
            .finish()
    }
}

impl PartialEq for ResultEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.insertion_order == other.insertion_order
    }
}
impl Eq for ResultEntry {}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by "worseness": higher cost is worse, ties broken by a higher
/// insertion order being worse. `BinaryHeap`'s max-heap discipline then puts
/// the worst candidate on top, so an overflow push evicts it with one `pop`.
impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .cmp(&other.cost)
            .then_with(|| self.insertion_order.cmp(&other.insertion_order))
    }
}

/// A capacity-bounded min-heap (by cost) of the best candidates seen so far.
pub struct ResultHeap {
    capacity: usize,
    heap: BinaryHeap<ResultEntry>,
}

impl ResultHeap {
    pub fn new(capacity: usize) -> Self {
        ResultHeap {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn push(&mut self, path: CandidatePath, insertion_order: u64) {
        self.heap.push(ResultEntry {
            cost: path.cost,
            insertion_order,
            path,
        });
        if self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    /// Drains the heap, applies `strategy`, and suppresses duplicate route
    /// signatures keeping the first (best) occurrence.
    pub fn into_sorted(self, strategy: &dyn PathOrderStrategy) -> Vec<CandidatePath> {
        let mut entries: Vec<(PathOrderKey, CandidatePath)> = self
            .heap
            .into_iter()
            .map(|e| {
                let key = PathOrderKey {
                    cost: e.cost,
                    hops: e.path.hops,
                    route_signature: e.path.route_signature(),
                    insertion_order: e.insertion_order,
                };
                (key, e.path)
            })
            .collect();

        entries.sort_by(|a, b| strategy.compare(&a.0, &b.0));

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::with_capacity(entries.len());
        for (key, path) in entries {
            if seen.insert(key.route_signature) {
                out.push(path);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candidate(cost: Decimal, hops: u32, to: &str) -> CandidatePath {
        CandidatePath {
            cost,
            product: Decimal::ONE / cost,
            hops,
            edges: vec![PathEdge {
                from: "EUR".into(),
                to: to.into(),
                order_ref: 0,
                rate: Decimal::ONE,
                side: Side::Sell,
                conversion_rate: Decimal::ONE,
            }],
            amount_range: None,
            desired_amount: None,
        }
    }

    #[test]
    fn evicts_worst_when_over_capacity() {
        let mut heap = ResultHeap::new(2);
        heap.push(candidate(dec!(1.0), 1, "A"), 0);
        heap.push(candidate(dec!(2.0), 1, "B"), 1);
        heap.push(candidate(dec!(0.5), 1, "C"), 2);
        assert_eq!(heap.len(), 2);
        let sorted = heap.into_sorted(&DefaultPathOrderStrategy);
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0].cost, dec!(0.5));
        assert_eq!(sorted[1].cost, dec!(1.0));
    }

    #[test]
    fn dedups_by_route_signature_keeping_best() {
        let mut heap = ResultHeap::new(5);
        heap.push(candidate(dec!(1.0), 1, "USD"), 0);
        heap.push(candidate(dec!(0.5), 1, "USD"), 1);
        let sorted = heap.into_sorted(&DefaultPathOrderStrategy);
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].cost, dec!(0.5));
    }
}
