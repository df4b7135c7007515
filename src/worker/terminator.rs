//! Graceful worker termination
//!
//! SIGTERM first, then a bounded poll for exit, then SIGKILL. Workers that
//! survive both stay owned by the caller so the next health sweep can deal
//! with them.

use super::WorkerProcess;
use crate::error::{AutoscaleError, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// How often the terminator re-checks a signalled worker
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Terminates workers with a graceful window before force-killing
pub struct WorkerTerminator {
    shutdown_timeout: Duration,
}

impl WorkerTerminator {
    /// Create a terminator with the given graceful window
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self { shutdown_timeout }
    }

    /// Terminate one worker; returns whether it exited gracefully
    ///
    /// An `Err` means the process could not be killed at all and is still
    /// running; the caller should keep it pooled for the next sweep.
    pub async fn terminate(&self, worker: &mut WorkerProcess) -> Result<bool> {
        if !worker.is_running() {
            // Already exited; nothing to signal
            return Ok(true);
        }
        let Some(pid) = worker.pid() else {
            return Ok(true);
        };

        debug!(queue = %worker.key(), pid, "sending SIGTERM");
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => {
                if self.wait_for_exit(worker).await {
                    info!(queue = %worker.key(), pid, "worker exited gracefully");
                    return Ok(true);
                }
                warn!(
                    queue = %worker.key(),
                    pid,
                    timeout_seconds = self.shutdown_timeout.as_secs(),
                    "worker ignored SIGTERM, force killing"
                );
            }
            Err(e) => {
                warn!(queue = %worker.key(), pid, error = %e, "SIGTERM delivery failed, force killing");
            }
        }

        match worker.child_mut().kill().await {
            Ok(()) => Ok(false),
            Err(e) => Err(AutoscaleError::Terminate {
                pid,
                message: e.to_string(),
            }),
        }
    }

    async fn wait_for_exit(&self, worker: &mut WorkerProcess) -> bool {
        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;
        while tokio::time::Instant::now() < deadline {
            if !worker.is_running() {
                return true;
            }
            sleep(POLL_INTERVAL).await;
        }
        !worker.is_running()
    }
}
