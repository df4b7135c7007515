//! Owning container of live worker processes
//!
//! The pool is the only owner of worker handles. Insertion order is spawn
//! order, so removal "from the front" always releases the oldest workers
//! first.

use super::WorkerProcess;
use crate::types::QueueKey;
use tracing::debug;

/// All live workers, indexed by the queue they serve
#[derive(Debug, Default)]
pub struct WorkerPool {
    workers: Vec<WorkerProcess>,
}

impl WorkerPool {
    /// An empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one worker
    pub fn add(&mut self, worker: WorkerProcess) {
        debug!(queue = %worker.key(), pid = ?worker.pid(), "worker added to pool");
        self.workers.push(worker);
    }

    /// Add a batch of workers
    pub fn add_all(&mut self, workers: Vec<WorkerProcess>) {
        for worker in workers {
            self.add(worker);
        }
    }

    /// Total workers in the pool, running or not
    pub fn count_total(&self) -> usize {
        self.workers.len()
    }

    /// Workers in the pool serving the given queue, running or not
    pub fn count_for_queue(&self, key: &QueueKey) -> usize {
        self.workers.iter().filter(|w| w.key() == key).count()
    }

    /// Workers serving the given queue whose process is still alive
    pub fn count_running(&mut self, key: &QueueKey) -> u32 {
        self.workers
            .iter_mut()
            .filter(|w| w.key() == key)
            .map(|w| w.is_running())
            .filter(|running| *running)
            .count() as u32
    }

    /// Remove up to `n` workers for a queue, oldest first
    pub fn take_for_queue(&mut self, key: &QueueKey, n: u32) -> Vec<WorkerProcess> {
        let mut taken = Vec::new();
        let mut index = 0;
        while index < self.workers.len() && taken.len() < n as usize {
            if self.workers[index].key() == key {
                taken.push(self.workers.remove(index));
            } else {
                index += 1;
            }
        }
        taken
    }

    /// Remove a specific worker by pid
    pub fn remove_by_pid(&mut self, pid: u32) -> Option<WorkerProcess> {
        let index = self.workers.iter().position(|w| w.pid() == Some(pid))?;
        Some(self.workers.remove(index))
    }

    /// Whether a worker with the given pid is in the pool
    pub fn find_pid(&self, pid: u32) -> bool {
        self.workers.iter().any(|w| w.pid() == Some(pid))
    }

    /// Remove and return every worker whose process has exited
    pub fn collect_dead(&mut self) -> Vec<WorkerProcess> {
        let mut dead = Vec::new();
        let mut index = 0;
        while index < self.workers.len() {
            if self.workers[index].is_running() {
                index += 1;
            } else {
                dead.push(self.workers.remove(index));
            }
        }
        dead
    }

    /// Remove and return every worker, leaving the pool empty
    pub fn drain_all(&mut self) -> Vec<WorkerProcess> {
        std::mem::take(&mut self.workers)
    }

    /// Iterate over the pooled workers
    pub fn iter(&self) -> impl Iterator<Item = &WorkerProcess> {
        self.workers.iter()
    }
}
