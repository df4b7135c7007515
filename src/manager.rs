//! Autoscale manager
//!
//! The manager owns the control loop: every tick it pulls fresh metrics,
//! lets the engine decide per queue, filters flapping reversals, threads
//! the decision through the policy pipeline, executes spawns and
//! terminations, publishes events, and sweeps dead workers. SIGTERM and
//! SIGINT stop the loop and drain the pool; SIGUSR2 recycles every worker.
//!
//! All per-queue state and all pool mutations live on this single task.

use crate::calculator::CapacityCalculator;
use crate::config::{validate, AutoscaleConfig, QueueConfig};
use crate::engine::ScalingEngine;
use crate::error::Result;
use crate::events::{AutoscaleEvent, EventBus};
use crate::metrics::{MetricsSource, QueueSnapshot};
use crate::policy::{build_pipeline, PolicyPipeline};
use crate::strategy::ScalingStrategy;
use crate::types::{QueueKey, ScaleAction, ScalingDecision};
use crate::worker::{WorkerPool, WorkerSpawner, WorkerTerminator};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Upper bound on one metrics collection call
const METRICS_TIMEOUT: Duration = Duration::from_secs(2);

/// The queue-worker autoscaler control loop
pub struct AutoscaleManager {
    config: AutoscaleConfig,
    engine: ScalingEngine,
    policies: PolicyPipeline,
    pool: WorkerPool,
    spawner: WorkerSpawner,
    terminator: WorkerTerminator,
    metrics: Arc<dyn MetricsSource>,
    events: EventBus,
    last_scale_time: HashMap<QueueKey, Instant>,
    last_scale_direction: HashMap<QueueKey, ScaleAction>,
    breach_state: HashMap<QueueKey, bool>,
    stop: Arc<AtomicBool>,
    recycle_workers: Arc<AtomicBool>,
}

impl AutoscaleManager {
    /// Build a manager from a validated configuration and a metrics source
    pub fn new(config: AutoscaleConfig, metrics: Arc<dyn MetricsSource>) -> Result<Self> {
        validate(&config)?;

        let events = EventBus::default();
        let strategy = ScalingStrategy::from_name(&config.strategy, &config.prediction)?;
        let capacity = CapacityCalculator::new(config.limits);
        let engine = ScalingEngine::new(strategy, capacity);
        let policies = build_pipeline(&config.policies, events.clone())?;
        let spawner = WorkerSpawner::new(config.workers.clone());
        let terminator =
            WorkerTerminator::new(Duration::from_secs(config.shutdown_timeout_seconds));

        Ok(Self {
            config,
            engine,
            policies,
            pool: WorkerPool::new(),
            spawner,
            terminator,
            metrics,
            events,
            last_scale_time: HashMap::new(),
            last_scale_direction: HashMap::new(),
            breach_state: HashMap::new(),
            stop: Arc::new(AtomicBool::new(false)),
            recycle_workers: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replace the engine, e.g. to pin a fixed capacity probe
    pub fn with_engine(mut self, engine: ScalingEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Event bus carrying every decision and lifecycle event
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The worker pool; exposed for inspection
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Flag that stops the loop after the current tick
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run the control loop until a shutdown signal arrives, then drain
    pub async fn run(&mut self) -> Result<()> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigusr2 = signal(SignalKind::user_defined2())?;

        let mut ticker = interval(Duration::from_secs(self.config.evaluation_interval_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_seconds = self.config.evaluation_interval_seconds,
            strategy = %self.config.strategy,
            "autoscaler started"
        );

        while !self.stop.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.recycle_workers.swap(false, Ordering::SeqCst) {
                        self.recycle_all_workers().await;
                    }
                    self.tick().await;
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM received, shutting down");
                    self.stop.store(true, Ordering::SeqCst);
                }
                _ = sigint.recv() => {
                    info!("SIGINT received, shutting down");
                    self.stop.store(true, Ordering::SeqCst);
                }
                _ = sigusr2.recv() => {
                    info!("SIGUSR2 received, recycling all workers");
                    self.recycle_workers.store(true, Ordering::SeqCst);
                }
            }
        }

        self.drain().await;
        Ok(())
    }

    /// Run one evaluation cycle over every known queue
    #[instrument(skip(self))]
    pub async fn tick(&mut self) {
        let (snapshots, metrics_available) =
            match timeout(METRICS_TIMEOUT, self.metrics.collect()).await {
                Ok(Ok(snapshots)) => (snapshots, true),
                Ok(Err(e)) => {
                    error!(error = %e, "metrics collection failed, skipping uncovered queues");
                    self.events.publish(AutoscaleEvent::MetricsUnavailable {
                        error: e.to_string(),
                    });
                    (Vec::new(), false)
                }
                Err(_) => {
                    error!("metrics collection timed out, skipping uncovered queues");
                    self.events.publish(AutoscaleEvent::MetricsUnavailable {
                        error: format!("timed out after {METRICS_TIMEOUT:?}"),
                    });
                    (Vec::new(), false)
                }
            };

        // BTreeMap keeps per-tick evaluation order stable across runs.
        let mut by_key: BTreeMap<QueueKey, QueueSnapshot> = snapshots
            .into_iter()
            .map(|s| (s.key(), s))
            .collect();
        if metrics_available {
            for key in self.config.configured_keys() {
                by_key
                    .entry(key.clone())
                    .or_insert_with(|| QueueSnapshot::cold(&key));
            }
        }

        for (key, snapshot) in by_key {
            self.evaluate_queue(&key, &snapshot).await;
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
        }

        self.sweep_dead();
    }

    /// Evaluate one queue and execute the resulting decision
    async fn evaluate_queue(&mut self, key: &QueueKey, snapshot: &QueueSnapshot) {
        let queue_config = self.config.queue_config(key);
        let current = self.pool.count_running(key);
        let decision = self.engine.evaluate(snapshot, &queue_config, current);

        let is_breaching = snapshot.oldest_age_seconds > 0
            && snapshot.oldest_age_seconds >= queue_config.slo_pickup_seconds;

        if self.held_by_cooldown(key, &decision, &queue_config, is_breaching) {
            return;
        }

        let decision = self.policies.apply_before(decision);
        let action = decision.action();

        let (executed, actual_to) = match action {
            ScaleAction::Up => self.scale_up(&decision),
            ScaleAction::Down => self.scale_down(&decision).await,
            ScaleAction::Hold => (false, decision.current_workers),
        };

        self.policies.run_after(&decision);

        self.events.publish(AutoscaleEvent::ScalingDecisionMade {
            decision: decision.clone(),
        });
        if decision.sla_breach_risk() {
            self.events.publish(AutoscaleEvent::SlaBreachPredicted {
                decision: decision.clone(),
            });
        }
        if action != ScaleAction::Hold {
            self.events.publish(AutoscaleEvent::WorkersScaled {
                connection: key.connection.clone(),
                queue: key.queue.clone(),
                from: decision.current_workers,
                to: actual_to,
                action,
                reason: decision.reason.clone(),
            });
        }

        self.track_breach(key, snapshot, &queue_config, is_breaching);

        if action != ScaleAction::Hold && executed {
            self.last_scale_time.insert(key.clone(), Instant::now());
            self.last_scale_direction.insert(key.clone(), action);
        }
    }

    /// Whether the anti-flapping cooldown holds this queue back this tick
    fn held_by_cooldown(
        &self,
        key: &QueueKey,
        decision: &ScalingDecision,
        queue_config: &QueueConfig,
        is_breaching: bool,
    ) -> bool {
        let wanted = decision.action();
        if wanted == ScaleAction::Hold || is_breaching {
            return false;
        }
        let (Some(last), Some(last_at)) = (
            self.last_scale_direction.get(key),
            self.last_scale_time.get(key),
        ) else {
            return false;
        };
        let reversal = wanted != *last;
        if !reversal && !queue_config.cooldown_blocks_same_direction {
            return false;
        }
        let elapsed = last_at.elapsed();
        if elapsed >= Duration::from_secs(queue_config.cooldown_seconds) {
            return false;
        }

        debug!(
            queue = %key,
            wanted = %wanted,
            last = %last,
            elapsed_seconds = elapsed.as_secs(),
            cooldown_seconds = queue_config.cooldown_seconds,
            "scaling held by cooldown"
        );
        self.events.publish(AutoscaleEvent::CooldownHold {
            connection: key.connection.clone(),
            queue: key.queue.clone(),
            wanted,
            last: *last,
        });
        true
    }

    /// Spawn workers toward the target; returns (any spawned, resulting count)
    fn scale_up(&mut self, decision: &ScalingDecision) -> (bool, u32) {
        let wanted = decision.workers_to_add();
        match self
            .spawner
            .spawn(&decision.key.connection, &decision.key.queue, wanted)
        {
            Ok(spawned) => {
                let count = spawned.len() as u32;
                if count < wanted {
                    warn!(
                        queue = %decision.key,
                        wanted,
                        spawned = count,
                        "partial spawn"
                    );
                }
                self.pool.add_all(spawned);
                (count > 0, decision.current_workers + count)
            }
            Err(e) => {
                error!(queue = %decision.key, error = %e, "spawn failed, holding");
                (false, decision.current_workers)
            }
        }
    }

    /// Terminate workers toward the target; returns (any removed, resulting count)
    async fn scale_down(&mut self, decision: &ScalingDecision) -> (bool, u32) {
        let wanted = decision.workers_to_remove();
        let workers = self.pool.take_for_queue(&decision.key, wanted);
        let mut removed = 0u32;
        for mut worker in workers {
            match self.terminator.terminate(&mut worker).await {
                Ok(_graceful) => removed += 1,
                Err(e) => {
                    warn!(queue = %decision.key, error = %e, "termination failed, repooling worker");
                    self.pool.add(worker);
                }
            }
        }
        (removed > 0, decision.current_workers - removed)
    }

    /// Emit breach edge events and update the per-queue breach flag
    fn track_breach(
        &mut self,
        key: &QueueKey,
        snapshot: &QueueSnapshot,
        queue_config: &QueueConfig,
        is_breaching: bool,
    ) {
        let was_breaching = self.breach_state.get(key).copied().unwrap_or(false);
        if is_breaching && !was_breaching {
            warn!(
                queue = %key,
                oldest_age_seconds = snapshot.oldest_age_seconds,
                slo_seconds = queue_config.slo_pickup_seconds,
                "pickup objective breached"
            );
            self.events.publish(AutoscaleEvent::SlaBreached {
                connection: key.connection.clone(),
                queue: key.queue.clone(),
                oldest_age_seconds: snapshot.oldest_age_seconds,
                slo_seconds: queue_config.slo_pickup_seconds,
                pending: snapshot.pending,
                active_workers: snapshot.active_workers,
            });
        } else if !is_breaching && was_breaching {
            info!(queue = %key, "pickup objective recovered");
            self.events.publish(AutoscaleEvent::SlaRecovered {
                connection: key.connection.clone(),
                queue: key.queue.clone(),
                oldest_age_seconds: snapshot.oldest_age_seconds,
                slo_seconds: queue_config.slo_pickup_seconds,
            });
        }
        self.breach_state.insert(key.clone(), is_breaching);
    }

    /// Remove workers whose process has exited and report them
    fn sweep_dead(&mut self) {
        for dead in self.pool.collect_dead() {
            let key = dead.key();
            let pid = dead.pid().unwrap_or(0);
            warn!(queue = %key, pid, "worker exited unexpectedly");
            self.events.publish(AutoscaleEvent::WorkerDied {
                connection: key.connection.clone(),
                queue: key.queue.clone(),
                pid,
            });
        }
    }

    /// Terminate every pooled worker; the next tick respawns to target
    async fn recycle_all_workers(&mut self) {
        let workers = self.pool.drain_all();
        info!(count = workers.len(), "recycling all workers");
        for mut worker in workers {
            if let Err(e) = self.terminator.terminate(&mut worker).await {
                warn!(error = %e, "termination failed during recycle, repooling");
                self.pool.add(worker);
            }
        }
    }

    /// Drain the pool at shutdown; every worker gets a termination attempt
    pub async fn drain(&mut self) {
        let workers = self.pool.drain_all();
        let total = workers.len();
        info!(count = total, "draining worker pool");

        let mut stopped = 0usize;
        for mut worker in workers {
            match self.terminator.terminate(&mut worker).await {
                Ok(_) => stopped += 1,
                Err(e) => {
                    error!(queue = %worker.key(), error = %e, "could not terminate worker at shutdown");
                }
            }
        }

        self.events
            .publish(AutoscaleEvent::ShutdownComplete {
                workers_stopped: stopped,
            });
        info!(stopped, total, "shutdown complete");
    }
}
