//! Hybrid predictive strategy
//!
//! Combines three sizing arms and takes the maximum:
//!
//! - **steady**: Little's Law over the measured processing rate
//! - **predictive**: Little's Law over the estimated arrival rate, buffered
//!   up when arrivals are growing and down when they are confidently
//!   shrinking
//! - **drain**: urgency-weighted backlog drain as the oldest job approaches
//!   its SLO
//!
//! Queues with no processing history fall back to estimated demand so a
//! cold supervisor still scales instead of waiting for metrics to warm up.

use super::{effective_service_seconds, finalize, predicted_pickup};
use crate::calculator::{drain_target, steady_state, ArrivalRateEstimator};
use crate::config::{PredictionConfig, QueueConfig};
use crate::metrics::QueueSnapshot;
use crate::types::StrategyOutcome;
use tracing::trace;

/// Confidence the estimator must report before a shrinking trend is trusted
const SHRINK_CONFIDENCE: f64 = 0.7;

/// The hybrid predictive strategy
pub struct HybridPredictive {
    prediction: PredictionConfig,
    estimator: ArrivalRateEstimator,
}

impl HybridPredictive {
    /// Create the strategy with the given prediction tunables
    pub fn new(prediction: PredictionConfig) -> Self {
        Self {
            prediction,
            estimator: ArrivalRateEstimator::new(),
        }
    }

    /// Access the arrival-rate estimator (e.g. to reset a queue's history)
    pub fn estimator_mut(&mut self) -> &mut ArrivalRateEstimator {
        &mut self.estimator
    }

    /// Desired worker count for one queue snapshot
    pub fn evaluate(&mut self, snapshot: &QueueSnapshot, config: &QueueConfig) -> StrategyOutcome {
        let service = effective_service_seconds(snapshot, self.prediction.fallback_service_seconds);
        let processing_rate = snapshot.throughput_per_minute / 60.0;
        let backlog = snapshot.pending;

        if processing_rate <= 0.0 {
            return self.without_throughput(snapshot, config, service);
        }

        let steady = steady_state(processing_rate, service);

        let estimate = self
            .estimator
            .estimate(&snapshot.key(), backlog, processing_rate);
        let buffer = if estimate.rate > processing_rate {
            self.prediction.trend_buffer_up
        } else if estimate.rate < processing_rate && estimate.confidence >= SHRINK_CONFIDENCE {
            self.prediction.trend_buffer_down
        } else {
            1.0
        };
        let predictive = estimate.rate * service * buffer;

        let drain = drain_target(
            backlog,
            snapshot.oldest_age_seconds,
            config.slo_pickup_seconds,
            service,
            config.breach_threshold,
        );

        let steady_w = steady.ceil();
        let predictive_w = predictive.ceil();
        let drain_w = drain.ceil();
        let target = steady_w.max(predictive_w).max(drain_w);

        let reason = if drain_w >= target && drain_w > 0.0 {
            "backlog drain within pickup objective".to_string()
        } else if predictive_w > steady_w {
            "predicted arrival trend".to_string()
        } else {
            "steady-state demand".to_string()
        };

        trace!(
            queue = %snapshot.key(),
            steady = steady_w,
            predictive = predictive_w,
            drain = drain_w,
            "hybrid arms evaluated"
        );

        let predicted = predicted_pickup(backlog, target, processing_rate);
        finalize(target, reason, predicted, config)
    }

    /// Sizing without a measured processing rate
    fn without_throughput(
        &mut self,
        snapshot: &QueueSnapshot,
        config: &QueueConfig,
        service: f64,
    ) -> StrategyOutcome {
        let backlog = snapshot.pending;

        if snapshot.active_workers > 0 {
            // Workers exist but throughput history is cold: assume they are
            // mostly busy and size against that assumed demand.
            let estimated_rate = (snapshot.active_workers as f64 / service)
                * self.prediction.fallback_utilization;
            let steady = steady_state(estimated_rate, service);
            let drain = drain_target(
                backlog,
                snapshot.oldest_age_seconds,
                config.slo_pickup_seconds,
                service,
                config.breach_threshold,
            );
            let target = steady.ceil().max(drain.ceil());
            let predicted = predicted_pickup(backlog, target, estimated_rate);
            return finalize(
                target,
                "assumed utilization (estimated)".to_string(),
                predicted,
                config,
            );
        }

        if backlog == 0 {
            // Nothing queued, nothing running, nothing measured.
            return finalize(0.0, "idle queue".to_string(), Some(0.0), config);
        }

        // Cold start with a backlog: enough workers to clear it inside the
        // SLO window, weighted up as the oldest job ages toward the target.
        let slo = config.slo_pickup_seconds.max(1) as f64;
        let required_rate = backlog as f64 / slo;
        let urgency = 1.0 + snapshot.oldest_age_seconds as f64 / slo;
        let target = (required_rate * service * urgency).ceil().max(1.0);
        finalize(
            target,
            "cold-start backlog demand (estimated)".to_string(),
            None,
            config,
        )
    }
}
