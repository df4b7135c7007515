//! A single worker child process

use crate::types::QueueKey;
use std::time::Instant;
use tokio::process::Child;

/// An owned worker child process and the queue it serves
#[derive(Debug)]
pub struct WorkerProcess {
    child: Child,
    pid: Option<u32>,
    key: QueueKey,
    spawned_at: Instant,
}

impl WorkerProcess {
    /// Wrap a freshly spawned child
    pub fn new(child: Child, key: QueueKey) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            key,
            spawned_at: Instant::now(),
        }
    }

    /// OS process id as observed at spawn time
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Queue this worker serves
    pub fn key(&self) -> &QueueKey {
        &self.key
    }

    /// Whether the worker serves the given queue
    pub fn matches(&self, connection: &str, queue: &str) -> bool {
        self.key.connection == connection && self.key.queue == queue
    }

    /// Seconds since the worker was spawned
    pub fn uptime_seconds(&self) -> u64 {
        self.spawned_at.elapsed().as_secs()
    }

    /// Whether the process is still running
    ///
    /// Reaps the exit status as a side effect when the process has exited.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Mutable access to the underlying child, for signal-free kill paths
    pub(crate) fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    fn spawn_sleep() -> WorkerProcess {
        let child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep");
        WorkerProcess::new(child, QueueKey::new("redis", "default"))
    }

    #[tokio::test]
    async fn live_process_reports_running_and_pid() {
        let mut worker = spawn_sleep();
        assert!(worker.is_running());
        assert!(worker.pid().is_some());
        assert!(worker.matches("redis", "default"));
        assert!(!worker.matches("redis", "other"));
        worker.child_mut().kill().await.unwrap();
    }

    #[tokio::test]
    async fn exited_process_reports_not_running() {
        let child = Command::new("true").spawn().expect("spawn true");
        let mut worker = WorkerProcess::new(child, QueueKey::new("redis", "default"));
        // Give the process a moment to exit
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!worker.is_running());
    }
}
