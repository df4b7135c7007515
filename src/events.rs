//! Decision and lifecycle events
//!
//! Every consequential moment in the control loop is published as an
//! [`AutoscaleEvent`] on a broadcast channel. Subscribers that fall behind
//! lose the oldest events rather than blocking the loop.

use crate::types::{QueueKey, ScaleAction, ScalingDecision};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Default broadcast channel capacity
const DEFAULT_CAPACITY: usize = 256;

/// Events published by the autoscaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AutoscaleEvent {
    /// A scaling decision was produced for a queue (every tick, every queue)
    ScalingDecisionMade {
        /// The decision
        decision: ScalingDecision,
    },

    /// Worker count changed (or a change was attempted and failed, from == to)
    WorkersScaled {
        /// Queue connection
        connection: String,
        /// Queue name
        queue: String,
        /// Worker count before the action
        from: u32,
        /// Worker count after the action
        to: u32,
        /// Direction of the action
        action: ScaleAction,
        /// Why the action was taken
        reason: String,
    },

    /// Predicted pickup time exceeds the SLO target
    SlaBreachPredicted {
        /// The decision carrying the prediction
        decision: ScalingDecision,
    },

    /// The oldest pending job crossed the SLO target
    SlaBreached {
        /// Queue connection
        connection: String,
        /// Queue name
        queue: String,
        /// Age of the oldest pending job in seconds
        oldest_age_seconds: u64,
        /// SLO target in seconds
        slo_seconds: u64,
        /// Pending jobs at breach time
        pending: u64,
        /// Active workers at breach time
        active_workers: u32,
    },

    /// A previously breaching queue is back within its SLO
    SlaRecovered {
        /// Queue connection
        connection: String,
        /// Queue name
        queue: String,
        /// Age of the oldest pending job in seconds
        oldest_age_seconds: u64,
        /// SLO target in seconds
        slo_seconds: u64,
    },

    /// A scaling action was held back by the anti-flapping cooldown
    CooldownHold {
        /// Queue connection
        connection: String,
        /// Queue name
        queue: String,
        /// Direction the decision wanted
        wanted: ScaleAction,
        /// Direction of the last executed action
        last: ScaleAction,
    },

    /// A worker exited without being asked to
    WorkerDied {
        /// Queue connection
        connection: String,
        /// Queue name
        queue: String,
        /// Process id of the dead worker
        pid: u32,
    },

    /// The metrics source failed or timed out this tick
    MetricsUnavailable {
        /// Description of the failure
        error: String,
    },

    /// The supervisor drained its pool and stopped
    ShutdownComplete {
        /// Workers terminated during the drain
        workers_stopped: usize,
    },
}

impl AutoscaleEvent {
    /// Queue key the event concerns, if it is queue-scoped
    pub fn queue_key(&self) -> Option<QueueKey> {
        match self {
            AutoscaleEvent::ScalingDecisionMade { decision }
            | AutoscaleEvent::SlaBreachPredicted { decision } => Some(decision.key.clone()),
            AutoscaleEvent::WorkersScaled {
                connection, queue, ..
            }
            | AutoscaleEvent::SlaBreached {
                connection, queue, ..
            }
            | AutoscaleEvent::SlaRecovered {
                connection, queue, ..
            }
            | AutoscaleEvent::CooldownHold {
                connection, queue, ..
            }
            | AutoscaleEvent::WorkerDied {
                connection, queue, ..
            } => Some(QueueKey::new(connection.clone(), queue.clone())),
            AutoscaleEvent::MetricsUnavailable { .. }
            | AutoscaleEvent::ShutdownComplete { .. } => None,
        }
    }
}

/// Broadcast bus for autoscaler events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AutoscaleEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AutoscaleEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; a bus with no subscribers drops it silently
    pub fn publish(&self, event: AutoscaleEvent) {
        if self.tx.send(event).is_err() {
            debug!("event published with no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
