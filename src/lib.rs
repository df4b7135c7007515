//! # Queuescale - SLO-Driven Worker Autoscaling
//!
//! A long-running supervisor that adjusts the number of queue-worker child
//! processes so the oldest pending job is always picked up within a
//! per-queue service-level objective, without exceeding what the host can
//! actually run.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   AutoscaleManager (tick)                │
//! │                                                          │
//! │  MetricsSource ──► ScalingEngine ──► PolicyPipeline      │
//! │                        │                    │            │
//! │        ┌───────────────┤                    ▼            │
//! │        │ Strategy arms │            Spawner / Terminator │
//! │        │  - steady     │                    │            │
//! │        │  - predictive │                    ▼            │
//! │        │  - drain      │               WorkerPool        │
//! │        └───────────────┘                                 │
//! │                                                          │
//! │  Capacity clamp ─ cooldown filter ─ EventBus             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every tick the manager pulls one snapshot per queue, the engine turns it
//! into a target worker count (strategy arms, then the capacity clamp, then
//! the configured bounds), the cooldown filter drops flapping reversals,
//! policies get a chance to rewrite the decision, and the pool is scaled by
//! spawning or signalling real OS processes. Everything observable is
//! published on the event bus.
//!
//! ## Example
//!
//! ```rust,no_run
//! use queuescale::{AutoscaleConfig, AutoscaleManager};
//! use queuescale::metrics::{MetricsSource, QueueSnapshot};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct RedisMetrics;
//!
//! #[async_trait]
//! impl MetricsSource for RedisMetrics {
//!     async fn collect(&self) -> queuescale::Result<Vec<QueueSnapshot>> {
//!         // Query your queue backend here
//!         Ok(Vec::new())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     queuescale::init_tracing();
//!
//!     let config = AutoscaleConfig::default();
//!     let mut manager = AutoscaleManager::new(config, Arc::new(RedisMetrics))?;
//!
//!     // Runs until SIGTERM/SIGINT, then drains every worker
//!     manager.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod calculator;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod manager;
pub mod metrics;
pub mod policy;
pub mod strategy;
pub mod types;
pub mod worker;

pub use config::{load_config, AutoscaleConfig, QueueConfig};
pub use engine::ScalingEngine;
pub use error::{AutoscaleError, Result};
pub use events::{AutoscaleEvent, EventBus};
pub use manager::AutoscaleManager;
pub use metrics::{MetricsSource, QueueSnapshot};
pub use strategy::ScalingStrategy;
pub use types::{QueueKey, ScaleAction, ScalingDecision};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with an env-filterable subscriber
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();
}
