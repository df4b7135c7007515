//! Worker process spawning
//!
//! The worker command is built as an explicit argument vector; nothing is
//! passed through a shell. Children stay parented to the supervisor and
//! share no terminal with it.

use super::WorkerProcess;
use crate::config::WorkerCommandConfig;
use crate::error::{AutoscaleError, Result};
use crate::types::QueueKey;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info};

/// Spawns worker child processes for a queue
pub struct WorkerSpawner {
    command: WorkerCommandConfig,
}

impl WorkerSpawner {
    /// Create a spawner from the worker command configuration
    pub fn new(command: WorkerCommandConfig) -> Self {
        Self { command }
    }

    /// Argument vector for a worker serving the given queue
    fn build_args(&self, connection: &str, queue: &str) -> Vec<String> {
        let mut args = self.command.args.clone();
        args.push(connection.to_string());
        args.push(format!("--queue={queue}"));
        args.push(format!("--tries={}", self.command.tries));
        args.push(format!("--max-time={}", self.command.timeout_seconds));
        args.push(format!("--sleep={}", self.command.sleep_seconds));
        args
    }

    /// Spawn `count` workers for a queue
    ///
    /// Spawning stops at the first failure; workers that did start are
    /// returned. An error is returned only when nothing could be spawned.
    pub fn spawn(&self, connection: &str, queue: &str, count: u32) -> Result<Vec<WorkerProcess>> {
        let key = QueueKey::new(connection, queue);
        let args = self.build_args(connection, queue);
        let mut spawned = Vec::new();

        for _ in 0..count {
            let mut command = Command::new(&self.command.binary);
            command
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                // Termination is explicit; dropping a handle must not kill
                .kill_on_drop(false);
            // Keep workers out of the supervisor's terminal process group
            #[cfg(unix)]
            command.process_group(0);

            match command.spawn() {
                Ok(child) => {
                    let worker = WorkerProcess::new(child, key.clone());
                    info!(queue = %key, pid = ?worker.pid(), "worker spawned");
                    spawned.push(worker);
                }
                Err(e) => {
                    error!(queue = %key, error = %e, "worker spawn failed");
                    break;
                }
            }
        }

        if spawned.is_empty() && count > 0 {
            return Err(AutoscaleError::Spawn {
                connection: connection.to_string(),
                queue: queue.to_string(),
                message: format!("could not start any of {count} workers"),
            });
        }

        Ok(spawned)
    }
}
