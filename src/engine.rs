//! Scaling engine
//!
//! The engine owns the strategy and the capacity calculator and produces
//! one [`ScalingDecision`] per queue per tick: strategy target, clamped by
//! measured system capacity, clamped by the queue's configured bounds.

use crate::calculator::CapacityCalculator;
use crate::config::QueueConfig;
use crate::metrics::QueueSnapshot;
use crate::strategy::ScalingStrategy;
use crate::types::{LimitingFactor, ScalingDecision};
use chrono::Utc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Produces scaling decisions by combining strategy, capacity, and config
pub struct ScalingEngine {
    strategy: ScalingStrategy,
    capacity: CapacityCalculator,
}

impl ScalingEngine {
    /// Create an engine from a strategy and a capacity calculator
    pub fn new(strategy: ScalingStrategy, capacity: CapacityCalculator) -> Self {
        Self { strategy, capacity }
    }

    /// Evaluate one queue and produce a decision
    #[instrument(skip(self, snapshot, config), fields(queue = %snapshot.key()))]
    pub fn evaluate(
        &mut self,
        snapshot: &QueueSnapshot,
        config: &QueueConfig,
        current_workers: u32,
    ) -> ScalingDecision {
        let outcome = self.strategy.evaluate(snapshot, config);
        let mut capacity = self.capacity.capacity_for(config.max_workers);

        let capped = outcome.target.min(capacity.final_limit);
        let target = capped.clamp(config.min_workers, config.max_workers.max(config.min_workers));

        // Record what actually bound the target. The probe's cpu/memory
        // factor survives only when the capacity clamp bit; a failed probe
        // keeps its capacity-unknown tag either way.
        if capacity.limiting_factor != LimitingFactor::CapacityUnknown {
            if capped > config.max_workers {
                capacity.limiting_factor = LimitingFactor::Config;
            } else if outcome.target <= capacity.final_limit {
                capacity.limiting_factor = LimitingFactor::Strategy;
            }
        }

        debug!(
            raw_target = outcome.target,
            capacity_limit = capacity.final_limit,
            target,
            current_workers,
            reason = %outcome.reason,
            "queue evaluated"
        );

        ScalingDecision {
            id: Uuid::new_v4(),
            key: snapshot.key(),
            current_workers,
            target_workers: target,
            reason: outcome.reason,
            predicted_pickup_seconds: outcome.predicted_pickup_seconds,
            slo_seconds: config.slo_pickup_seconds,
            capacity,
            decided_at: Utc::now(),
        }
    }
}
