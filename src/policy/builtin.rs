//! Built-in policies

use super::ScalingPolicy;
use crate::error::Result;
use crate::events::{AutoscaleEvent, EventBus};
use crate::types::{ScaleAction, ScalingDecision};
use tracing::warn;

/// Fraction of the SLO at which the breach notification starts warning
const WARN_RATIO: f64 = 0.9;

/// Limits every scale-down to one worker per tick
pub struct ConservativeScaleDown;

impl ScalingPolicy for ConservativeScaleDown {
    fn name(&self) -> &'static str {
        "conservative_scale_down"
    }

    fn before(&self, decision: &ScalingDecision) -> Result<Option<ScalingDecision>> {
        if decision.action() != ScaleAction::Down {
            return Ok(None);
        }
        let floor = decision.current_workers.saturating_sub(1);
        if decision.target_workers >= floor {
            return Ok(None);
        }
        let mut rewritten = decision.clone();
        rewritten.target_workers = floor;
        rewritten.reason = format!("{} (conservative step-down)", decision.reason);
        Ok(Some(rewritten))
    }
}

/// Allows the full scale-down step the engine asked for
pub struct AggressiveScaleDown;

impl ScalingPolicy for AggressiveScaleDown {
    fn name(&self) -> &'static str {
        "aggressive_scale_down"
    }
}

/// Vetoes every scale-down; workers only ever drain by dying
pub struct NoScaleDown;

impl ScalingPolicy for NoScaleDown {
    fn name(&self) -> &'static str {
        "no_scale_down"
    }

    fn before(&self, decision: &ScalingDecision) -> Result<Option<ScalingDecision>> {
        if decision.action() != ScaleAction::Down {
            return Ok(None);
        }
        let mut rewritten = decision.clone();
        rewritten.target_workers = decision.current_workers;
        rewritten.reason = format!("{} (scale-down disabled)", decision.reason);
        Ok(Some(rewritten))
    }
}

/// Warns when the predicted pickup time nears or passes the SLO
pub struct BreachNotification {
    events: EventBus,
}

impl BreachNotification {
    /// Create the policy with the bus it should warn on
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }
}

impl ScalingPolicy for BreachNotification {
    fn name(&self) -> &'static str {
        "breach_notification"
    }

    fn after(&self, decision: &ScalingDecision) -> Result<()> {
        let Some(predicted) = decision.predicted_pickup_seconds else {
            return Ok(());
        };
        let slo = decision.slo_seconds as f64;
        if slo <= 0.0 {
            return Ok(());
        }
        if predicted > slo || predicted / slo >= WARN_RATIO {
            warn!(
                queue = %decision.key,
                predicted_pickup_seconds = predicted,
                slo_seconds = decision.slo_seconds,
                "predicted pickup time approaching objective"
            );
            // The control loop already publishes the hard-risk event when
            // the prediction passes the objective; this hook covers the
            // early-warning band just under it.
            if predicted <= slo {
                self.events.publish(AutoscaleEvent::SlaBreachPredicted {
                    decision: decision.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CapacityResult, LimitingFactor, QueueKey};
    use chrono::Utc;
    use uuid::Uuid;

    fn decision(current: u32, target: u32, predicted: Option<f64>) -> ScalingDecision {
        ScalingDecision {
            id: Uuid::new_v4(),
            key: QueueKey::new("redis", "default"),
            current_workers: current,
            target_workers: target,
            reason: "test".to_string(),
            predicted_pickup_seconds: predicted,
            slo_seconds: 30,
            capacity: CapacityResult {
                max_by_cpu: 16,
                max_by_memory: 32,
                max_by_config: 50,
                final_limit: 16,
                limiting_factor: LimitingFactor::Strategy,
            },
            decided_at: Utc::now(),
        }
    }

    #[test]
    fn conservative_caps_downward_steps_at_one() {
        let policy = ConservativeScaleDown;
        let rewritten = policy.before(&decision(10, 2, None)).unwrap().unwrap();
        assert_eq!(rewritten.target_workers, 9);

        // A single-step down passes through untouched
        assert!(policy.before(&decision(10, 9, None)).unwrap().is_none());
        // Scale-up is untouched
        assert!(policy.before(&decision(2, 10, None)).unwrap().is_none());
    }

    #[test]
    fn aggressive_is_identity() {
        let policy = AggressiveScaleDown;
        assert!(policy.before(&decision(10, 2, None)).unwrap().is_none());
    }

    #[test]
    fn no_scale_down_pins_to_current() {
        let policy = NoScaleDown;
        let rewritten = policy.before(&decision(10, 2, None)).unwrap().unwrap();
        assert_eq!(rewritten.target_workers, 10);
        assert_eq!(rewritten.action(), ScaleAction::Hold);

        assert!(policy.before(&decision(2, 10, None)).unwrap().is_none());
    }

    #[tokio::test]
    async fn breach_notification_warns_near_the_objective() {
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let policy = BreachNotification::new(events);

        // 28 / 30 = 0.93, above the warn ratio
        policy.after(&decision(5, 5, Some(28.0))).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            AutoscaleEvent::SlaBreachPredicted { .. }
        ));

        // Comfortably inside the objective: silence
        policy.after(&decision(5, 5, Some(3.0))).unwrap();
        assert!(rx.try_recv().is_err());

        // No prediction at all: silence
        policy.after(&decision(5, 5, None)).unwrap();
        assert!(rx.try_recv().is_err());
    }
}
