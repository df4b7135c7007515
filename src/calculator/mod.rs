//! Worker-count calculators
//!
//! Three pure-math arms feed the scaling strategy: Little's Law for
//! steady-state sizing, a per-queue arrival-rate estimator for trend, and
//! an urgency-weighted backlog-drain calculator that takes over as the
//! oldest job approaches its SLO. A fourth calculator turns measured system
//! resources into an upper bound.

pub mod arrival_rate;
pub mod backlog_drain;
pub mod capacity;
pub mod littles_law;

pub use arrival_rate::{ArrivalEstimate, ArrivalRateEstimator, RateSource};
pub use backlog_drain::drain_target;
pub use capacity::{CapacityCalculator, SystemProbe};
pub use littles_law::steady_state;
