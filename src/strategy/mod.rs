//! Scaling strategies
//!
//! A strategy turns one queue snapshot into a desired worker count. The
//! default is the hybrid predictive strategy, which takes the maximum of a
//! steady-state arm, a trend-buffered predictive arm, and a backlog-drain
//! arm. Two single-arm strategies exist for operators who want simpler,
//! more explainable behavior.

pub mod hybrid;

pub use hybrid::HybridPredictive;

use crate::calculator::{drain_target, steady_state};
use crate::config::{PredictionConfig, QueueConfig};
use crate::error::{AutoscaleError, Result};
use crate::metrics::QueueSnapshot;
use crate::types::StrategyOutcome;

/// Reason tag applied when strategy arithmetic produced a non-finite target
pub(crate) const DEGENERATE_REASON: &str = "degenerate-inputs";

/// Service time the single-arm strategies assume when nothing is measured
const FALLBACK_SERVICE_SECONDS: f64 = 2.0;

/// A scaling strategy, selected by name at startup
pub enum ScalingStrategy {
    /// Steady-state arm only: rate × service time
    LittlesOnly,
    /// Backlog-drain arm only
    BacklogOnly,
    /// All three arms combined
    HybridPredictive(HybridPredictive),
}

impl ScalingStrategy {
    /// Build a strategy from its configured identifier
    pub fn from_name(name: &str, prediction: &PredictionConfig) -> Result<Self> {
        match name {
            "littles_only" => Ok(ScalingStrategy::LittlesOnly),
            "backlog_only" => Ok(ScalingStrategy::BacklogOnly),
            "hybrid_predictive" => Ok(ScalingStrategy::HybridPredictive(HybridPredictive::new(
                prediction.clone(),
            ))),
            other => Err(AutoscaleError::Config(format!("unknown strategy: {other}"))),
        }
    }

    /// Identifier this strategy was built from
    pub fn name(&self) -> &'static str {
        match self {
            ScalingStrategy::LittlesOnly => "littles_only",
            ScalingStrategy::BacklogOnly => "backlog_only",
            ScalingStrategy::HybridPredictive(_) => "hybrid_predictive",
        }
    }

    /// Desired worker count for one queue snapshot
    pub fn evaluate(&mut self, snapshot: &QueueSnapshot, config: &QueueConfig) -> StrategyOutcome {
        match self {
            ScalingStrategy::LittlesOnly => littles_only(snapshot, config),
            ScalingStrategy::BacklogOnly => backlog_only(snapshot, config),
            ScalingStrategy::HybridPredictive(hybrid) => hybrid.evaluate(snapshot, config),
        }
    }
}

fn littles_only(snapshot: &QueueSnapshot, config: &QueueConfig) -> StrategyOutcome {
    let service = effective_service_seconds(snapshot, FALLBACK_SERVICE_SECONDS);
    let rate = snapshot.throughput_per_minute / 60.0;
    let target = steady_state(rate, service).ceil();
    finalize(
        target,
        "steady-state demand".to_string(),
        predicted_pickup(snapshot.pending, target, rate),
        config,
    )
}

fn backlog_only(snapshot: &QueueSnapshot, config: &QueueConfig) -> StrategyOutcome {
    let service = effective_service_seconds(snapshot, FALLBACK_SERVICE_SECONDS);
    let rate = snapshot.throughput_per_minute / 60.0;
    let target = drain_target(
        snapshot.pending,
        snapshot.oldest_age_seconds,
        config.slo_pickup_seconds,
        service,
        config.breach_threshold,
    )
    .ceil();
    finalize(
        target,
        "backlog drain".to_string(),
        predicted_pickup(snapshot.pending, target, rate),
        config,
    )
}

/// Best available estimate of per-job service time in seconds
pub(crate) fn effective_service_seconds(snapshot: &QueueSnapshot, fallback: f64) -> f64 {
    if snapshot.avg_duration_seconds > 0.0 {
        return snapshot.avg_duration_seconds;
    }
    let rate = snapshot.throughput_per_minute / 60.0;
    if snapshot.active_workers > 0 && rate > 0.0 {
        // Little's Law inverted: busy workers / completion rate
        snapshot.active_workers as f64 / rate
    } else {
        fallback
    }
}

/// Seconds until the oldest pending job is picked up at the target size
pub(crate) fn predicted_pickup(backlog: u64, target: f64, rate: f64) -> Option<f64> {
    if backlog == 0 {
        Some(0.0)
    } else if target > 0.0 && rate > 0.0 {
        Some(backlog as f64 / (target * rate))
    } else {
        None
    }
}

/// Clamp a raw arm result into a valid outcome, guarding degenerate math
pub(crate) fn finalize(
    target: f64,
    reason: String,
    predicted: Option<f64>,
    config: &QueueConfig,
) -> StrategyOutcome {
    if !target.is_finite() || target < 0.0 {
        return StrategyOutcome {
            target: config.min_workers,
            reason: DEGENERATE_REASON.to_string(),
            predicted_pickup_seconds: None,
        };
    }
    StrategyOutcome {
        target: target.min(u32::MAX as f64) as u32,
        reason,
        predicted_pickup_seconds: predicted.filter(|p| p.is_finite()),
    }
}
