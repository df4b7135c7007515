//! Queue metrics input
//!
//! The autoscaler does not measure queues itself; a metrics collaborator
//! hands it one `QueueSnapshot` per queue per tick through the
//! [`MetricsSource`] trait. Snapshots are read-only to the core.

use crate::error::Result;
use crate::types::QueueKey;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pre-aggregated metrics for one queue at one instant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Queue connection
    pub connection: String,

    /// Queue name
    pub queue: String,

    /// Queue driver tag (e.g. "redis", "database")
    pub driver: String,

    /// Jobs waiting to be picked up
    pub pending: u64,

    /// Jobs currently held by workers
    pub reserved: u64,

    /// Jobs scheduled for the future
    pub delayed: u64,

    /// Age of the oldest pending job in whole seconds, 0 if unknown
    pub oldest_age_seconds: u64,

    /// Processing throughput in jobs per minute, 0 when history is cold
    pub throughput_per_minute: f64,

    /// Average job duration in seconds, 0 when unknown
    pub avg_duration_seconds: f64,

    /// Job failure rate in percent
    pub failure_rate: f64,

    /// Worker utilization in percent
    pub utilization: f64,

    /// Active workers observed by the metrics source
    pub active_workers: u32,

    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
}

impl QueueSnapshot {
    /// Key of the queue this snapshot describes
    pub fn key(&self) -> QueueKey {
        QueueKey::new(self.connection.clone(), self.queue.clone())
    }

    /// Total queue depth across pending, reserved, and delayed jobs
    pub fn total_depth(&self) -> u64 {
        self.pending + self.reserved + self.delayed
    }

    /// A zeroed snapshot for a queue the metrics source has not covered yet
    pub fn cold(key: &QueueKey) -> Self {
        Self {
            connection: key.connection.clone(),
            queue: key.queue.clone(),
            driver: String::new(),
            pending: 0,
            reserved: 0,
            delayed: 0,
            oldest_age_seconds: 0,
            throughput_per_minute: 0.0,
            avg_duration_seconds: 0.0,
            failure_rate: 0.0,
            utilization: 0.0,
            active_workers: 0,
            timestamp: Utc::now(),
        }
    }
}

/// Pull interface to the metrics collaborator; called once per tick
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Collect a snapshot for every queue the source knows about
    async fn collect(&self) -> Result<Vec<QueueSnapshot>>;
}
