//! Tolerance-aware best-paths search over a capacitated peer-to-peer order
//! graph.
//!
//! Given a source asset, a target asset, and a spend window, this crate finds
//! up to `top_k` distinct paths through a set of orders that maximize the
//! cumulative conversion rate, subject to per-order capacity, hop, and
//! tolerance bounds. All arithmetic is arbitrary-precision decimal; there is
//! no floating point anywhere on the money or cost path.
//!
//! The pipeline: [`graph::GraphBuilder`] turns orders into a [`graph::Graph`],
//! [`search::SearchEngine`] explores it to produce [`topk::CandidatePath`]s,
//! and [`materializer::Materializer`] turns an accepted candidate into a
//! concrete [`materializer::PathResult`] with per-leg spend/receive amounts.
//!
//! Order-book construction, live market data, network I/O, and any CLI/HTTP
//! surface are out of scope — callers supply orders and an
//! [`order::OrderFillEvaluator`] and consume [`search::SearchOutcome`] /
//! [`materializer::PathResult`] directly.

pub mod config;
pub mod decimal;
pub mod error;
pub mod graph;
pub mod materializer;
pub mod money;
pub mod order;
pub mod search;
pub mod tolerance;
pub mod topk;

pub use config::EngineConfig;
pub use error::{CoreError, CoreResult};
pub use graph::{Graph, GraphBuilder, GraphEdge, Range, Segment};
pub use materializer::{MaterializeError, Materializer, MaterializedLeg, PathResult};
pub use money::{ExchangeRate, Money};
pub use order::{
    AssetPair, FeeBreakdown, FeePolicy, FillBounds, FillResult, LinearFillEvaluator, Order,
    OrderFillEvaluator, ProportionalQuoteFee, Side,
};
pub use search::{GuardLimitStatus, SearchEngine, SearchOutcome, SpendConstraints};
pub use tolerance::ToleranceWindow;
pub use topk::{CandidatePath, DefaultPathOrderStrategy, PathEdge, PathOrderKey, PathOrderStrategy};
