//! Construction-time engine configuration.
//!
//! Mirrors the upstream `EngineConfig`'s plain-struct-with-`Default` shape
//! (`rust_backend/src/types.rs`), but immutable once built: unlike the
//! upstream `ConfigManager`, which wraps its config in a `parking_lot::RwLock`
//! for live reconfiguration, a [`EngineConfig`] is validated once and then
//! carried by value for the lifetime of a single [`crate::search::SearchEngine`].

use crate::error::CoreError;
use crate::topk::PathOrderStrategy;
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Clone)]
pub struct EngineConfig {
    pub max_hops: u32,
    pub tolerance: Decimal,
    pub top_k: usize,
    pub max_expansions: u64,
    pub max_visited_states: u64,
    pub ordering_strategy: Option<Arc<dyn PathOrderStrategy>>,
    pub time_budget_ms: Option<u64>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("max_hops", &self.max_hops)
            .field("tolerance", &self.tolerance)
            .field("top_k", &self.top_k)
            .field("max_expansions", &self.max_expansions)
            .field("max_visited_states", &self.max_visited_states)
            .field("time_budget_ms", &self.time_budget_ms)
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_hops: 4,
            tolerance: Decimal::ZERO,
            top_k: 10,
            max_expansions: 250_000,
            max_visited_states: 250_000,
            ordering_strategy: None,
            time_budget_ms: None,
        }
    }
}

impl EngineConfig {
    /// Validates resource bounds, failing closed rather than clamping silently.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_hops < 1 {
            return Err(CoreError::InvalidInput("max_hops must be >= 1".into()));
        }
        if self.top_k < 1 {
            return Err(CoreError::InvalidInput("top_k must be >= 1".into()));
        }
        if self.max_expansions < 1 {
            return Err(CoreError::InvalidInput("max_expansions must be >= 1".into()));
        }
        if self.max_visited_states < 1 {
            return Err(CoreError::InvalidInput("max_visited_states must be >= 1".into()));
        }
        if self.tolerance < Decimal::ZERO || self.tolerance >= Decimal::ONE {
            return Err(CoreError::InvalidInput(
                "tolerance must lie in [0, 1)".into(),
            ));
        }
        if let Some(budget) = self.time_budget_ms {
            if budget < 1 {
                return Err(CoreError::InvalidInput(
                    "time_budget_ms must be >= 1 when present".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.top_k = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn tolerance_of_one_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.tolerance = Decimal::ONE;
        assert!(cfg.validate().is_err());
    }
}
