//! Urgency-weighted backlog draining
//!
//! Steady-state sizing keeps up with arrivals but does nothing about jobs
//! already waiting. As the oldest pending job approaches its SLO, this
//! calculator demands enough workers to drain the backlog before the
//! deadline, with a multiplier that grows as the deadline nears.

/// Worker count needed to drain `backlog` before the SLO is breached
///
/// `oldest_age_seconds` of 0 means the age is unknown; the backlog is then
/// sized against the full SLO window with no urgency multiplier. Below the
/// activation point (the smaller of `breach_threshold` and 0.5 of the SLO)
/// the drain arm is inactive and returns 0.
pub fn drain_target(
    backlog: u64,
    oldest_age_seconds: u64,
    slo_seconds: u64,
    service_seconds: f64,
    breach_threshold: f64,
) -> f64 {
    if backlog == 0 || service_seconds <= 0.0 || slo_seconds == 0 {
        return 0.0;
    }

    let backlog = backlog as f64;
    let slo = slo_seconds as f64;
    let age = oldest_age_seconds as f64;

    if oldest_age_seconds == 0 {
        // Age unknown: size against the whole SLO window.
        let jobs_per_worker = (slo / service_seconds).max(1.0);
        return backlog / jobs_per_worker;
    }

    let progress = age / slo;
    let activation = breach_threshold.min(0.5);
    if progress < activation {
        return 0.0;
    }

    let multiplier = if progress >= 1.0 {
        // Already breached: drain as fast as the service time allows.
        let base = backlog / service_seconds.max(0.1);
        return base * 3.0;
    } else if progress >= 0.9 {
        2.0
    } else if progress >= breach_threshold {
        1.5
    } else {
        // Elevated band below the threshold, reachable when threshold > 0.5
        1.2
    };

    // Each worker can finish (slo - age) / service jobs before the deadline.
    let jobs_per_worker = ((slo - age) / service_seconds).max(1.0);
    let base = backlog / jobs_per_worker;
    base * multiplier
}
