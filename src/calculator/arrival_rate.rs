//! Arrival-rate estimation from backlog deltas
//!
//! The metrics source reports how fast jobs are being processed, not how
//! fast they arrive. Over a measurement interval the two differ by the
//! backlog growth: `arrivals = processed + Δbacklog`. The estimator keeps
//! one sample per queue and derives the effective arrival rate from the
//! delta, with a confidence score reflecting how trustworthy the interval
//! was.

use crate::types::QueueKey;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Intervals shorter than this are too noisy to difference
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Samples older than this no longer describe the queue
const STALE_AFTER: Duration = Duration::from_secs(60);

/// How the estimate was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    /// First observation for this queue
    NoHistory,
    /// Interval since the last sample was under a second
    IntervalTooShort,
    /// Last sample was too old to difference against
    HistoryStale,
    /// Rate derived from the backlog delta
    Measured,
}

/// An arrival-rate estimate with its confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrivalEstimate {
    /// Effective arrival rate in jobs per second, never negative
    pub rate: f64,
    /// Confidence in the estimate, 0 to 1
    pub confidence: f64,
    /// How the estimate was obtained
    pub source: RateSource,
}

#[derive(Debug, Clone, Copy)]
struct ArrivalSample {
    backlog: u64,
    observed_at: Instant,
    last_rate: f64,
}

/// Per-queue arrival-rate estimator with a one-sample history
#[derive(Debug, Default)]
pub struct ArrivalRateEstimator {
    history: HashMap<QueueKey, ArrivalSample>,
}

impl ArrivalRateEstimator {
    /// Create an empty estimator
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimate the effective arrival rate for a queue
    ///
    /// `processing_rate` is in jobs per second. History is updated only when
    /// a fresh estimate is actually computed.
    pub fn estimate(
        &mut self,
        key: &QueueKey,
        current_backlog: u64,
        processing_rate: f64,
    ) -> ArrivalEstimate {
        self.estimate_at(key, current_backlog, processing_rate, Instant::now())
    }

    fn estimate_at(
        &mut self,
        key: &QueueKey,
        current_backlog: u64,
        processing_rate: f64,
        now: Instant,
    ) -> ArrivalEstimate {
        let prior = match self.history.get(key) {
            Some(prior) => *prior,
            None => {
                self.record(key, current_backlog, processing_rate, now);
                return ArrivalEstimate {
                    rate: processing_rate.max(0.0),
                    confidence: 0.3,
                    source: RateSource::NoHistory,
                };
            }
        };

        let interval = now.duration_since(prior.observed_at);

        if interval < MIN_INTERVAL {
            // Too short to difference; reuse the previous rate shape without
            // touching the stored sample.
            return ArrivalEstimate {
                rate: processing_rate.max(0.0),
                confidence: 0.3,
                source: RateSource::IntervalTooShort,
            };
        }

        if interval > STALE_AFTER {
            self.record(key, current_backlog, processing_rate, now);
            return ArrivalEstimate {
                rate: processing_rate.max(0.0),
                confidence: 0.4,
                source: RateSource::HistoryStale,
            };
        }

        let interval_secs = interval.as_secs_f64();
        let backlog_delta = current_backlog as i64 - prior.backlog as i64;
        let growth = backlog_delta as f64 / interval_secs;
        let rate = (processing_rate + growth).max(0.0);

        let mut confidence: f64 = 0.8;
        if !(5.0..=30.0).contains(&interval_secs) {
            confidence -= 0.15;
        }
        if backlog_delta.abs() < 3 {
            confidence -= 0.15;
        }
        let confidence = confidence.max(0.5);

        debug!(
            queue = %key,
            backlog_delta,
            interval_secs,
            rate,
            confidence,
            "arrival rate measured"
        );

        self.record_rate(key, current_backlog, rate, now);

        ArrivalEstimate {
            rate,
            confidence,
            source: RateSource::Measured,
        }
    }

    /// Last rate stored for a queue, if any
    pub fn last_rate(&self, key: &QueueKey) -> Option<f64> {
        self.history.get(key).map(|s| s.last_rate)
    }

    /// Forget the history for one queue
    pub fn reset(&mut self, key: &QueueKey) {
        self.history.remove(key);
    }

    /// Forget all history
    pub fn reset_all(&mut self) {
        self.history.clear();
    }

    fn record(&mut self, key: &QueueKey, backlog: u64, rate: f64, now: Instant) {
        self.record_rate(key, backlog, rate.max(0.0), now);
    }

    fn record_rate(&mut self, key: &QueueKey, backlog: u64, rate: f64, now: Instant) {
        self.history.insert(
            key.clone(),
            ArrivalSample {
                backlog,
                observed_at: now,
                last_rate: rate,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> QueueKey {
        QueueKey::new("redis", "default")
    }

    #[test]
    fn first_observation_uses_processing_rate() {
        let mut estimator = ArrivalRateEstimator::new();
        let estimate = estimator.estimate(&key(), 100, 5.0);
        assert_eq!(estimate.rate, 5.0);
        assert_eq!(estimate.confidence, 0.3);
        assert_eq!(estimate.source, RateSource::NoHistory);
        assert_eq!(estimator.last_rate(&key()), Some(5.0));
    }

    #[test]
    fn short_interval_leaves_history_untouched() {
        let mut estimator = ArrivalRateEstimator::new();
        let start = Instant::now();
        estimator.estimate_at(&key(), 100, 5.0, start);

        let estimate = estimator.estimate_at(&key(), 500, 5.0, start + Duration::from_millis(200));
        assert_eq!(estimate.source, RateSource::IntervalTooShort);
        assert_eq!(estimate.confidence, 0.3);

        // The 500-backlog observation must not have replaced the sample.
        let later = estimator.estimate_at(&key(), 200, 5.0, start + Duration::from_secs(10));
        assert_eq!(later.source, RateSource::Measured);
        assert!((later.rate - (5.0 + 100.0 / 10.0)).abs() < 1e-9);
    }

    #[test]
    fn stale_history_is_discarded() {
        let mut estimator = ArrivalRateEstimator::new();
        let start = Instant::now();
        estimator.estimate_at(&key(), 100, 5.0, start);

        let estimate = estimator.estimate_at(&key(), 400, 6.0, start + Duration::from_secs(120));
        assert_eq!(estimate.source, RateSource::HistoryStale);
        assert_eq!(estimate.rate, 6.0);
        assert_eq!(estimate.confidence, 0.4);
    }

    #[test]
    fn growing_backlog_raises_the_rate() {
        let mut estimator = ArrivalRateEstimator::new();
        let start = Instant::now();
        estimator.estimate_at(&key(), 100, 10.0, start);

        // +50 jobs over 10 s on top of 10 jobs/s processed
        let estimate = estimator.estimate_at(&key(), 150, 10.0, start + Duration::from_secs(10));
        assert_eq!(estimate.source, RateSource::Measured);
        assert!((estimate.rate - 15.0).abs() < 1e-9);
        assert_eq!(estimate.confidence, 0.8);
    }

    #[test]
    fn shrinking_backlog_never_goes_negative() {
        let mut estimator = ArrivalRateEstimator::new();
        let start = Instant::now();
        estimator.estimate_at(&key(), 1000, 1.0, start);

        // Backlog collapsed far faster than processing alone explains
        let estimate = estimator.estimate_at(&key(), 0, 1.0, start + Duration::from_secs(10));
        assert_eq!(estimate.source, RateSource::Measured);
        assert_eq!(estimate.rate, 0.0);
    }

    #[test]
    fn small_deltas_and_odd_intervals_lower_confidence() {
        let mut estimator = ArrivalRateEstimator::new();
        let start = Instant::now();
        estimator.estimate_at(&key(), 100, 5.0, start);

        // 2 s interval, delta 1: both penalties apply
        let estimate = estimator.estimate_at(&key(), 101, 5.0, start + Duration::from_secs(2));
        assert_eq!(estimate.confidence, 0.5);

        // Ideal interval, small delta: one penalty
        let estimate = estimator.estimate_at(&key(), 102, 5.0, start + Duration::from_secs(10));
        assert!((estimate.confidence - 0.65).abs() < 1e-9);
    }

    #[test]
    fn reset_forgets_a_queue() {
        let mut estimator = ArrivalRateEstimator::new();
        estimator.estimate(&key(), 100, 5.0);
        estimator.reset(&key());
        assert_eq!(estimator.last_rate(&key()), None);

        let estimate = estimator.estimate(&key(), 100, 5.0);
        assert_eq!(estimate.source, RateSource::NoHistory);
    }
}
