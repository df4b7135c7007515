//! Policy pipeline
//!
//! Policies wrap the physical scale action with a pair of hooks: `before`
//! may rewrite the decision (the last rewrite wins), `after` observes the
//! decision once the action has run. A failing hook is logged and skipped;
//! policies can slow scaling down or veto it, never crash the loop.

pub mod builtin;

pub use builtin::{
    AggressiveScaleDown, BreachNotification, ConservativeScaleDown, NoScaleDown,
};

use crate::error::{AutoscaleError, Result};
use crate::events::EventBus;
use crate::types::ScalingDecision;
use tracing::warn;

/// A scaling policy: an optional rewrite before the action, an observer after
pub trait ScalingPolicy: Send + Sync {
    /// Configured identifier of this policy
    fn name(&self) -> &'static str;

    /// Inspect the pending decision; return a replacement to rewrite it
    fn before(&self, _decision: &ScalingDecision) -> Result<Option<ScalingDecision>> {
        Ok(None)
    }

    /// Observe the decision after the scale action has run
    fn after(&self, _decision: &ScalingDecision) -> Result<()> {
        Ok(())
    }
}

/// Ordered list of policies threaded around every scale action
#[derive(Default)]
pub struct PolicyPipeline {
    policies: Vec<Box<dyn ScalingPolicy>>,
}

impl PolicyPipeline {
    /// An empty pipeline; identity over decisions
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a policy to the end of the pipeline
    pub fn push(&mut self, policy: Box<dyn ScalingPolicy>) {
        self.policies.push(policy);
    }

    /// Number of policies in the pipeline
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether the pipeline is empty
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Thread a decision through every `before` hook in order
    pub fn apply_before(&self, decision: ScalingDecision) -> ScalingDecision {
        let mut current = decision;
        for policy in &self.policies {
            match policy.before(&current) {
                Ok(Some(rewritten)) => current = rewritten,
                Ok(None) => {}
                Err(e) => {
                    warn!(policy = policy.name(), error = %e, "before hook failed, skipping");
                }
            }
        }
        current
    }

    /// Run every `after` hook in order; failures are logged and skipped
    pub fn run_after(&self, decision: &ScalingDecision) {
        for policy in &self.policies {
            if let Err(e) = policy.after(decision) {
                warn!(policy = policy.name(), error = %e, "after hook failed");
            }
        }
    }
}

/// Build a pipeline from ordered policy identifiers
pub fn build_pipeline(names: &[String], events: EventBus) -> Result<PolicyPipeline> {
    let mut pipeline = PolicyPipeline::new();
    let mut scale_down_seen = false;

    for name in names {
        let policy: Box<dyn ScalingPolicy> = match name.as_str() {
            "conservative_scale_down" => Box::new(ConservativeScaleDown),
            "aggressive_scale_down" => Box::new(AggressiveScaleDown),
            "no_scale_down" => Box::new(NoScaleDown),
            "breach_notification" => Box::new(BreachNotification::new(events.clone())),
            other => {
                return Err(AutoscaleError::Config(format!("unknown policy: {other}")));
            }
        };

        let is_scale_down = matches!(
            name.as_str(),
            "conservative_scale_down" | "aggressive_scale_down" | "no_scale_down"
        );
        if is_scale_down {
            if scale_down_seen {
                return Err(AutoscaleError::Config(
                    "at most one scale-down policy may be configured".to_string(),
                ));
            }
            scale_down_seen = true;
        }

        pipeline.push(policy);
    }

    Ok(pipeline)
}
