//! Little's Law steady-state sizing
//!
//! L = λW: with jobs arriving at `rate` per second and each occupying a
//! worker for `service` seconds, `rate × service` workers are busy in
//! steady state.

/// Workers needed to keep up with `rate` jobs/s at `service` seconds each
///
/// Returns 0 unless both inputs are strictly positive.
pub fn steady_state(rate_per_sec: f64, service_seconds: f64) -> f64 {
    if rate_per_sec > 0.0 && service_seconds > 0.0 {
        rate_per_sec * service_seconds
    } else {
        0.0
    }
}
