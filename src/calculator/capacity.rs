//! System-capacity bound on worker count
//!
//! Workers are real OS processes; spawning more of them than the host has
//! CPU and memory headroom for makes every queue slower. The capacity
//! calculator measures the host each tick and converts the remaining
//! headroom into a maximum worker count. Nothing is cached between ticks.

use crate::config::LimitsConfig;
use crate::types::{CapacityResult, LimitingFactor};
use sysinfo::System;
use tracing::warn;

/// Worker bound used when the system cannot be measured
const FALLBACK_WORKERS: u32 = 4;

/// A point-in-time measurement of host resources
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemProbe {
    /// Logical cores on the host
    pub total_cores: u32,
    /// Current CPU usage across all cores, in percent
    pub cpu_usage_percent: f64,
    /// Total memory in MB
    pub total_memory_mb: u64,
    /// Used memory in MB
    pub used_memory_mb: u64,
}

enum ProbeSource {
    Live(System),
    Fixed(SystemProbe),
}

/// Converts host headroom into an upper bound on worker count
pub struct CapacityCalculator {
    limits: LimitsConfig,
    source: ProbeSource,
}

impl CapacityCalculator {
    /// Calculator that measures the live host via `sysinfo`
    pub fn new(limits: LimitsConfig) -> Self {
        Self {
            limits,
            source: ProbeSource::Live(System::new()),
        }
    }

    /// Calculator with a fixed probe, for deterministic evaluation
    pub fn with_fixed_probe(limits: LimitsConfig, probe: SystemProbe) -> Self {
        Self {
            limits,
            source: ProbeSource::Fixed(probe),
        }
    }

    /// Measure the host and derive the capacity bounds for one queue
    pub fn capacity_for(&mut self, max_by_config: u32) -> CapacityResult {
        let probe = match &mut self.source {
            ProbeSource::Fixed(probe) => Some(*probe),
            ProbeSource::Live(system) => {
                system.refresh_cpu_usage();
                system.refresh_memory();
                let total_cores = system.cpus().len() as u32;
                let total_memory_mb = system.total_memory() / (1024 * 1024);
                if total_cores == 0 || total_memory_mb == 0 {
                    None
                } else {
                    Some(SystemProbe {
                        total_cores,
                        cpu_usage_percent: system.global_cpu_usage() as f64,
                        total_memory_mb,
                        used_memory_mb: system.used_memory() / (1024 * 1024),
                    })
                }
            }
        };

        match probe {
            Some(probe) => compute(&self.limits, &probe, max_by_config),
            None => {
                warn!("system metrics unavailable, assuming {FALLBACK_WORKERS} workers fit");
                CapacityResult {
                    max_by_cpu: FALLBACK_WORKERS,
                    max_by_memory: FALLBACK_WORKERS,
                    max_by_config,
                    final_limit: FALLBACK_WORKERS,
                    limiting_factor: LimitingFactor::CapacityUnknown,
                }
            }
        }
    }
}

/// Pure capacity math over one probe
fn compute(limits: &LimitsConfig, probe: &SystemProbe, max_by_config: u32) -> CapacityResult {
    let usable_cores = probe
        .total_cores
        .saturating_sub(limits.reserve_cpu_cores)
        .max(1) as f64;
    let available_cpu_fraction =
        ((limits.max_cpu_percent as f64 - probe.cpu_usage_percent) / 100.0).max(0.0);
    let max_by_cpu = (usable_cores * available_cpu_fraction).floor() as u32;

    let used_memory_percent = if probe.total_memory_mb > 0 {
        probe.used_memory_mb as f64 / probe.total_memory_mb as f64 * 100.0
    } else {
        100.0
    };
    let available_memory_fraction =
        ((limits.max_memory_percent as f64 - used_memory_percent) / 100.0).max(0.0);
    let max_by_memory = (probe.total_memory_mb as f64 * available_memory_fraction
        / limits.worker_memory_mb_estimate.max(1) as f64)
        .floor() as u32;

    let final_limit = max_by_cpu.min(max_by_memory);
    let limiting_factor = match max_by_cpu.cmp(&max_by_memory) {
        std::cmp::Ordering::Less => LimitingFactor::Cpu,
        std::cmp::Ordering::Greater => LimitingFactor::Memory,
        std::cmp::Ordering::Equal => LimitingFactor::Balanced,
    };

    CapacityResult {
        max_by_cpu,
        max_by_memory,
        max_by_config,
        final_limit,
        limiting_factor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> LimitsConfig {
        LimitsConfig {
            max_cpu_percent: 85,
            max_memory_percent: 85,
            worker_memory_mb_estimate: 128,
            reserve_cpu_cores: 1,
        }
    }

    fn probe() -> SystemProbe {
        SystemProbe {
            total_cores: 9,
            cpu_usage_percent: 35.0,
            total_memory_mb: 16_384,
            used_memory_mb: 8_192,
        }
    }

    #[test]
    fn cpu_bound_uses_headroom_over_usable_cores() {
        let mut calc = CapacityCalculator::with_fixed_probe(limits(), probe());
        let result = calc.capacity_for(100);
        // 8 usable cores × (85 - 35)% = 4
        assert_eq!(result.max_by_cpu, 4);
        // 16384 MB × (85 - 50)% / 128 MB = 44
        assert_eq!(result.max_by_memory, 44);
        assert_eq!(result.final_limit, 4);
        assert_eq!(result.limiting_factor, LimitingFactor::Cpu);
        assert_eq!(result.max_by_config, 100);
    }

    #[test]
    fn memory_bound_wins_when_tighter() {
        let mut tight_memory = probe();
        tight_memory.total_memory_mb = 2048;
        tight_memory.used_memory_mb = 1536;
        let mut calc = CapacityCalculator::with_fixed_probe(limits(), tight_memory);
        let result = calc.capacity_for(100);
        // 2048 MB × (85 - 75)% / 128 MB = 1
        assert_eq!(result.max_by_memory, 1);
        assert_eq!(result.final_limit, 1);
        assert_eq!(result.limiting_factor, LimitingFactor::Memory);
    }

    #[test]
    fn saturated_host_yields_zero() {
        let mut saturated = probe();
        saturated.cpu_usage_percent = 95.0;
        let mut calc = CapacityCalculator::with_fixed_probe(limits(), saturated);
        let result = calc.capacity_for(100);
        assert_eq!(result.max_by_cpu, 0);
        assert_eq!(result.final_limit, 0);
    }

    #[test]
    fn at_least_one_core_is_always_usable() {
        let mut single_core = probe();
        single_core.total_cores = 1;
        let mut calc = CapacityCalculator::with_fixed_probe(limits(), single_core);
        let result = calc.capacity_for(100);
        // reserve of 1 would leave 0 cores; clamp keeps 1 usable
        assert_eq!(result.max_by_cpu, 0); // 1 × 0.50 floors to 0
        let mut idle = single_core;
        idle.cpu_usage_percent = 0.0;
        let mut calc = CapacityCalculator::with_fixed_probe(limits(), idle);
        assert_eq!(calc.capacity_for(100).max_by_cpu, 0); // 1 × 0.85 floors to 0
    }

    #[test]
    fn live_probe_produces_a_result() {
        let mut calc = CapacityCalculator::new(limits());
        let result = calc.capacity_for(10);
        assert_eq!(result.max_by_config, 10);
        // Whatever the host looks like, the result is internally consistent.
        assert_eq!(
            result.final_limit,
            result.max_by_cpu.min(result.max_by_memory)
        );
    }
}
