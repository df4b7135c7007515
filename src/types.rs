//! Core types shared across the autoscaler
//!
//! A queue is identified by its `(connection, queue)` pair everywhere in the
//! system; `QueueKey` is that pair. `ScalingDecision` is the record produced
//! by the engine each tick and consumed by the policy pipeline, the manager,
//! and event subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a queue: the connection it lives on plus its name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueKey {
    /// Queue connection (e.g. "redis", "database")
    pub connection: String,
    /// Queue name within the connection
    pub queue: String,
}

impl QueueKey {
    /// Create a new queue key
    pub fn new(connection: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            queue: queue.into(),
        }
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.connection, self.queue)
    }
}

/// Direction of a scaling action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaleAction {
    /// Add workers
    Up,
    /// Remove workers
    Down,
    /// No change
    Hold,
}

impl fmt::Display for ScaleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleAction::Up => write!(f, "up"),
            ScaleAction::Down => write!(f, "down"),
            ScaleAction::Hold => write!(f, "hold"),
        }
    }
}

/// Which bound determined the final worker target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitingFactor {
    /// CPU headroom produced the binding limit
    Cpu,
    /// Memory headroom produced the binding limit
    Memory,
    /// CPU and memory limits coincided
    Balanced,
    /// Per-queue configured maximum was binding
    Config,
    /// The strategy target was within every bound
    Strategy,
    /// System metrics were unavailable; a conservative constant was used
    CapacityUnknown,
}

impl fmt::Display for LimitingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitingFactor::Cpu => write!(f, "cpu"),
            LimitingFactor::Memory => write!(f, "memory"),
            LimitingFactor::Balanced => write!(f, "balanced"),
            LimitingFactor::Config => write!(f, "config"),
            LimitingFactor::Strategy => write!(f, "strategy"),
            LimitingFactor::CapacityUnknown => write!(f, "capacity-unknown"),
        }
    }
}

/// Upper bounds on worker count derived from system resources and config
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityResult {
    /// Maximum workers permitted by CPU headroom
    pub max_by_cpu: u32,
    /// Maximum workers permitted by memory headroom
    pub max_by_memory: u32,
    /// Maximum workers permitted by per-queue configuration
    pub max_by_config: u32,
    /// min(cpu, memory), never negative
    pub final_limit: u32,
    /// Which bound was binding
    pub limiting_factor: LimitingFactor,
}

/// Raw output of a scaling strategy, before capacity and config clamps
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    /// Desired worker count
    pub target: u32,
    /// Which arm of the strategy dominated
    pub reason: String,
    /// Estimated seconds until the oldest pending job is picked up
    pub predicted_pickup_seconds: Option<f64>,
}

/// One scaling decision for one queue, produced by the engine each tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingDecision {
    /// Unique identifier
    pub id: Uuid,

    /// Queue the decision applies to
    pub key: QueueKey,

    /// Workers currently in the pool for this queue
    pub current_workers: u32,

    /// Worker count the queue should be running
    pub target_workers: u32,

    /// Which arm or bound produced the target
    pub reason: String,

    /// Estimated seconds until the oldest pending job is picked up
    pub predicted_pickup_seconds: Option<f64>,

    /// SLO pickup target for the queue, in seconds
    pub slo_seconds: u64,

    /// Capacity bounds that applied to this decision
    pub capacity: CapacityResult,

    /// When the decision was made
    pub decided_at: DateTime<Utc>,
}

impl ScalingDecision {
    /// Direction implied by current vs target worker counts
    pub fn action(&self) -> ScaleAction {
        match self.target_workers.cmp(&self.current_workers) {
            std::cmp::Ordering::Greater => ScaleAction::Up,
            std::cmp::Ordering::Less => ScaleAction::Down,
            std::cmp::Ordering::Equal => ScaleAction::Hold,
        }
    }

    /// Workers to spawn when scaling up, 0 otherwise
    pub fn workers_to_add(&self) -> u32 {
        self.target_workers.saturating_sub(self.current_workers)
    }

    /// Workers to terminate when scaling down, 0 otherwise
    pub fn workers_to_remove(&self) -> u32 {
        self.current_workers.saturating_sub(self.target_workers)
    }

    /// Whether the predicted pickup time exceeds the SLO target
    pub fn sla_breach_risk(&self) -> bool {
        match self.predicted_pickup_seconds {
            Some(predicted) => predicted > self.slo_seconds as f64,
            None => false,
        }
    }
}
