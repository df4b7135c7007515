//! Configuration loading and management
//!
//! Loading hierarchy: env > file > defaults. The file is TOML; environment
//! variables use the `QUEUESCALE_` prefix. Validation runs once at startup
//! and is the only fatal error path in the system.

use crate::error::{AutoscaleError, Result};
use crate::types::QueueKey;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level autoscaler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscaleConfig {
    /// Control loop period in seconds
    pub evaluation_interval_seconds: u64,

    /// Graceful termination window per worker in seconds
    pub shutdown_timeout_seconds: u64,

    /// Defaults applied to queues without explicit overrides
    pub slo_defaults: SloDefaults,

    /// Tunables for the predictive strategy arms
    pub prediction: PredictionConfig,

    /// System resource ceilings
    pub limits: LimitsConfig,

    /// Worker process command construction
    pub workers: WorkerCommandConfig,

    /// Per-queue overrides
    pub queues: Vec<QueueOverride>,

    /// Scaling strategy identifier
    pub strategy: String,

    /// Ordered policy identifiers
    pub policies: Vec<String>,
}

impl Default for AutoscaleConfig {
    fn default() -> Self {
        Self {
            evaluation_interval_seconds: 5,
            shutdown_timeout_seconds: 30,
            slo_defaults: SloDefaults::default(),
            prediction: PredictionConfig::default(),
            limits: LimitsConfig::default(),
            workers: WorkerCommandConfig::default(),
            queues: Vec::new(),
            strategy: "hybrid_predictive".to_string(),
            policies: vec![
                "conservative_scale_down".to_string(),
                "breach_notification".to_string(),
            ],
        }
    }
}

/// Per-queue SLO defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SloDefaults {
    /// Maximum acceptable pickup delay in seconds
    pub max_pickup_time_seconds: u64,
    /// Minimum workers per queue
    pub min_workers: u32,
    /// Maximum workers per queue
    pub max_workers: u32,
    /// Minimum seconds between direction-reversing scale actions
    pub scale_cooldown_seconds: u64,
    /// Compatibility flag: also apply the cooldown to same-direction repeats
    pub cooldown_blocks_same_direction: bool,
}

impl Default for SloDefaults {
    fn default() -> Self {
        Self {
            max_pickup_time_seconds: 30,
            min_workers: 1,
            max_workers: 10,
            scale_cooldown_seconds: 60,
            cooldown_blocks_same_direction: false,
        }
    }
}

/// Tunables for the hybrid predictive strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Fraction of the SLO at which the backlog-drain arm activates
    pub breach_threshold: f64,
    /// Multiplier applied to the predictive arm when arrivals are growing
    pub trend_buffer_up: f64,
    /// Multiplier applied when arrivals are shrinking with high confidence
    pub trend_buffer_down: f64,
    /// Service time assumed when no duration data exists, in seconds
    pub fallback_service_seconds: f64,
    /// Worker utilization assumed on the estimated-rate fallback path
    pub fallback_utilization: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            breach_threshold: 0.8,
            trend_buffer_up: 1.2,
            trend_buffer_down: 0.9,
            fallback_service_seconds: 2.0,
            fallback_utilization: 0.75,
        }
    }
}

/// System resource ceilings for the capacity calculator
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// CPU usage ceiling as a percentage of all cores
    pub max_cpu_percent: u32,
    /// Memory usage ceiling as a percentage of total memory
    pub max_memory_percent: u32,
    /// Estimated resident memory per worker in MB
    pub worker_memory_mb_estimate: u32,
    /// Cores withheld from the worker budget
    pub reserve_cpu_cores: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_cpu_percent: 85,
            max_memory_percent: 85,
            worker_memory_mb_estimate: 128,
            reserve_cpu_cores: 1,
        }
    }
}

/// Worker process command construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerCommandConfig {
    /// Runtime binary to invoke
    pub binary: String,
    /// Leading arguments before the connection (the queue-worker subcommand)
    pub args: Vec<String>,
    /// Retry attempts per job
    pub tries: u32,
    /// Maximum worker lifetime in seconds
    pub timeout_seconds: u64,
    /// Idle sleep between polls in seconds
    pub sleep_seconds: u64,
}

impl Default for WorkerCommandConfig {
    fn default() -> Self {
        Self {
            binary: "php".to_string(),
            args: vec!["artisan".to_string(), "queue:work".to_string()],
            tries: 3,
            timeout_seconds: 3600,
            sleep_seconds: 3,
        }
    }
}

/// Per-queue overrides; unset fields fall back to `SloDefaults`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueOverride {
    /// Queue connection
    pub connection: String,
    /// Queue name
    pub queue: String,
    /// SLO pickup target override
    pub max_pickup_time_seconds: Option<u64>,
    /// Minimum workers override
    pub min_workers: Option<u32>,
    /// Maximum workers override
    pub max_workers: Option<u32>,
    /// Cooldown override
    pub scale_cooldown_seconds: Option<u64>,
    /// Breach threshold override
    pub breach_threshold: Option<f64>,
}

/// Resolved per-queue configuration the engine and manager operate on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueConfig {
    /// Maximum acceptable pickup delay in seconds
    pub slo_pickup_seconds: u64,
    /// Minimum workers
    pub min_workers: u32,
    /// Maximum workers
    pub max_workers: u32,
    /// Minimum seconds between direction-reversing scale actions
    pub cooldown_seconds: u64,
    /// Fraction of the SLO at which the drain arm activates
    pub breach_threshold: f64,
    /// Compatibility flag: also apply the cooldown to same-direction repeats
    pub cooldown_blocks_same_direction: bool,
}

impl AutoscaleConfig {
    /// Resolve the effective configuration for one queue
    pub fn queue_config(&self, key: &QueueKey) -> QueueConfig {
        let defaults = &self.slo_defaults;
        let overrides = self
            .queues
            .iter()
            .find(|q| q.connection == key.connection && q.queue == key.queue);

        let slo = overrides
            .and_then(|o| o.max_pickup_time_seconds)
            .unwrap_or(defaults.max_pickup_time_seconds);
        let min = overrides
            .and_then(|o| o.min_workers)
            .unwrap_or(defaults.min_workers);
        let max = overrides
            .and_then(|o| o.max_workers)
            .unwrap_or(defaults.max_workers);
        let cooldown = overrides
            .and_then(|o| o.scale_cooldown_seconds)
            .unwrap_or(defaults.scale_cooldown_seconds);
        let breach_threshold = overrides
            .and_then(|o| o.breach_threshold)
            .unwrap_or(self.prediction.breach_threshold);

        QueueConfig {
            slo_pickup_seconds: slo,
            min_workers: min,
            max_workers: max,
            cooldown_seconds: cooldown,
            breach_threshold,
            cooldown_blocks_same_direction: defaults.cooldown_blocks_same_direction,
        }
    }

    /// Keys of every explicitly configured queue
    pub fn configured_keys(&self) -> Vec<QueueKey> {
        self.queues
            .iter()
            .map(|q| QueueKey::new(q.connection.clone(), q.queue.clone()))
            .collect()
    }

    /// Set the evaluation interval
    pub fn with_evaluation_interval(mut self, seconds: u64) -> Self {
        self.evaluation_interval_seconds = seconds;
        self
    }

    /// Set the strategy identifier
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    /// Set the ordered policy identifiers
    pub fn with_policies(mut self, policies: Vec<String>) -> Self {
        self.policies = policies;
        self
    }
}

/// Load configuration from a file, then apply environment overrides
pub fn load_config(path: &Path) -> Result<AutoscaleConfig> {
    let mut config = if path.exists() {
        load_from_file(path)?
    } else {
        AutoscaleConfig::default()
    };

    apply_env_overrides(&mut config);
    validate(&config)?;

    Ok(config)
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path) -> Result<AutoscaleConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| AutoscaleError::Config(format!("parse {path:?}: {e}")))
}

/// Apply `QUEUESCALE_*` environment variable overrides
pub fn apply_env_overrides(config: &mut AutoscaleConfig) {
    if let Some(v) = env_u64("QUEUESCALE_EVALUATION_INTERVAL_SECONDS") {
        config.evaluation_interval_seconds = v;
    }
    if let Some(v) = env_u64("QUEUESCALE_SHUTDOWN_TIMEOUT_SECONDS") {
        config.shutdown_timeout_seconds = v;
    }
    if let Some(v) = env_u64("QUEUESCALE_SLO_MAX_PICKUP_TIME_SECONDS") {
        config.slo_defaults.max_pickup_time_seconds = v;
    }
    if let Some(v) = env_u32("QUEUESCALE_SLO_MIN_WORKERS") {
        config.slo_defaults.min_workers = v;
    }
    if let Some(v) = env_u32("QUEUESCALE_SLO_MAX_WORKERS") {
        config.slo_defaults.max_workers = v;
    }
    if let Some(v) = env_u64("QUEUESCALE_SLO_SCALE_COOLDOWN_SECONDS") {
        config.slo_defaults.scale_cooldown_seconds = v;
    }
    if let Some(v) = env_u32("QUEUESCALE_LIMITS_MAX_CPU_PERCENT") {
        config.limits.max_cpu_percent = v;
    }
    if let Some(v) = env_u32("QUEUESCALE_LIMITS_MAX_MEMORY_PERCENT") {
        config.limits.max_memory_percent = v;
    }
    if let Some(v) = env_u32("QUEUESCALE_LIMITS_WORKER_MEMORY_MB_ESTIMATE") {
        config.limits.worker_memory_mb_estimate = v;
    }
    if let Ok(v) = std::env::var("QUEUESCALE_STRATEGY") {
        config.strategy = v;
    }
    if let Ok(v) = std::env::var("QUEUESCALE_WORKERS_BINARY") {
        config.workers.binary = v;
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Known scale-down policy identifiers; a configuration may name at most one
const SCALE_DOWN_POLICIES: &[&str] = &[
    "conservative_scale_down",
    "aggressive_scale_down",
    "no_scale_down",
];

/// Known policy identifiers
const KNOWN_POLICIES: &[&str] = &[
    "conservative_scale_down",
    "aggressive_scale_down",
    "no_scale_down",
    "breach_notification",
];

/// Known strategy identifiers
const KNOWN_STRATEGIES: &[&str] = &["littles_only", "backlog_only", "hybrid_predictive"];

/// Validate a configuration; failures here abort startup
pub fn validate(config: &AutoscaleConfig) -> Result<()> {
    if config.evaluation_interval_seconds == 0 {
        return Err(AutoscaleError::Config(
            "evaluation_interval_seconds must be positive".to_string(),
        ));
    }
    if config.slo_defaults.max_pickup_time_seconds == 0 {
        return Err(AutoscaleError::Config(
            "slo_defaults.max_pickup_time_seconds must be positive".to_string(),
        ));
    }
    if config.slo_defaults.max_workers < config.slo_defaults.min_workers {
        return Err(AutoscaleError::Config(format!(
            "slo_defaults.max_workers ({}) < min_workers ({})",
            config.slo_defaults.max_workers, config.slo_defaults.min_workers
        )));
    }
    let threshold = config.prediction.breach_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(AutoscaleError::Config(format!(
            "prediction.breach_threshold must be in (0, 1], got {threshold}"
        )));
    }
    if config.limits.worker_memory_mb_estimate == 0 {
        return Err(AutoscaleError::Config(
            "limits.worker_memory_mb_estimate must be positive".to_string(),
        ));
    }
    if config.workers.binary.is_empty() {
        return Err(AutoscaleError::Config(
            "workers.binary must not be empty".to_string(),
        ));
    }
    if !KNOWN_STRATEGIES.contains(&config.strategy.as_str()) {
        return Err(AutoscaleError::Config(format!(
            "unknown strategy: {}",
            config.strategy
        )));
    }
    for policy in &config.policies {
        if !KNOWN_POLICIES.contains(&policy.as_str()) {
            return Err(AutoscaleError::Config(format!("unknown policy: {policy}")));
        }
    }
    let scale_down_count = config
        .policies
        .iter()
        .filter(|p| SCALE_DOWN_POLICIES.contains(&p.as_str()))
        .count();
    if scale_down_count > 1 {
        return Err(AutoscaleError::Config(
            "at most one scale-down policy may be configured".to_string(),
        ));
    }
    for queue in &config.queues {
        let key = QueueKey::new(queue.connection.clone(), queue.queue.clone());
        let resolved = config.queue_config(&key);
        if resolved.slo_pickup_seconds == 0 {
            return Err(AutoscaleError::Config(format!(
                "queue {key}: max_pickup_time_seconds must be positive"
            )));
        }
        if resolved.max_workers < resolved.min_workers {
            return Err(AutoscaleError::Config(format!(
                "queue {key}: max_workers ({}) < min_workers ({})",
                resolved.max_workers, resolved.min_workers
            )));
        }
        if !(resolved.breach_threshold > 0.0 && resolved.breach_threshold <= 1.0) {
            return Err(AutoscaleError::Config(format!(
                "queue {key}: breach_threshold must be in (0, 1]"
            )));
        }
    }
    Ok(())
}
