//! Worker pool for parallel batch loading.
//!
//! Each worker owns a bounded task channel and a bounded output channel.
//! The caller routes task `k` to worker `k % n` and reads result `k` back
//! from the same worker, so output order never depends on thread timing.
//!
//! # Key features
//! - Bounded channels cap memory at `num_workers x buffer_size` batches
//! - Graceful shutdown on drop
//! - Worker threads named `dataloader-worker-{id}`

use anyhow::{anyhow, ensure, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Thread pool with per-worker channels.
///
/// - Task channels: main thread -> worker `i`
/// - Output channels: worker `i` -> main thread
/// - Shutdown flag: checked by workers between polls
///
/// # Type Parameters
/// - `Task`: Work items sent to workers
/// - `Output`: Results returned from workers
pub(crate) struct WorkerPool<Task, Output> {
    workers: Vec<thread::JoinHandle<()>>,
    task_txs: Vec<Sender<Task>>,
    output_rxs: Vec<Receiver<Output>>,
    shutdown: Arc<AtomicBool>,
}

impl<Task, Output> WorkerPool<Task, Output>
where
    Task: Send + 'static,
    Output: Send + 'static,
{
    /// Spawns `num_workers` threads named `dataloader-worker-{id}`, each
    /// running `worker_fn(worker_id, tasks, outputs, shutdown)`.
    pub(crate) fn new<F>(num_workers: usize, buffer_size: usize, worker_fn: F) -> Result<Self>
    where
        F: Fn(usize, Receiver<Task>, Sender<Output>, Arc<AtomicBool>) + Send + Sync + 'static,
    {
        ensure!(
            num_workers > 0,
            "Cannot create WorkerPool with 0 workers. \
            Either set num_workers > 0 or use single-threaded mode."
        );
        ensure!(
            buffer_size > 0,
            "Cannot create WorkerPool with buffer_size 0. \
            Buffer size must be > 0 to prevent deadlocks."
        );

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_fn = Arc::new(worker_fn);
        let mut workers = Vec::with_capacity(num_workers);
        let mut task_txs = Vec::with_capacity(num_workers);
        let mut output_rxs = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let (task_tx, task_rx) = bounded(buffer_size);
            let (output_tx, output_rx) = bounded(buffer_size);
            task_txs.push(task_tx);
            output_rxs.push(output_rx);

            let shutdown_clone = shutdown.clone();
            let worker_fn_clone = worker_fn.clone();

            let handle = thread::Builder::new()
                .name(format!("dataloader-worker-{}", worker_id))
                .spawn(move || worker_fn_clone(worker_id, task_rx, output_tx, shutdown_clone))
                .with_context(|| format!("Failed to spawn worker thread {}", worker_id))?;

            workers.push(handle);
        }

        Ok(Self {
            workers,
            task_txs,
            output_rxs,
            shutdown,
        })
    }

    pub(crate) fn num_workers(&self) -> usize {
        self.task_txs.len()
    }

    /// Queues a task on a specific worker. Blocks while that worker's queue is full.
    pub(crate) fn send(&self, worker_id: usize, task: Task) -> Result<()> {
        let tx = self
            .task_txs
            .get(worker_id)
            .ok_or_else(|| anyhow!("No worker with id {}", worker_id))?;
        tx.send(task)
            .map_err(|_| anyhow!("Worker {} channel closed", worker_id))
    }

    /// Receives the next output of a specific worker, waiting at most `timeout`.
    pub(crate) fn recv(&self, worker_id: usize, timeout: Duration) -> Result<Output> {
        let rx = self
            .output_rxs
            .get(worker_id)
            .ok_or_else(|| anyhow!("No worker with id {}", worker_id))?;
        rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => anyhow!(
                "Worker {} timeout after {:?} - possible deadlock or slow data loading",
                worker_id,
                timeout
            ),
            RecvTimeoutError::Disconnected => {
                anyhow!("Worker {} disconnected - the thread may have panicked", worker_id)
            }
        })
    }
}

impl<Task, Output> Drop for WorkerPool<Task, Output> {
    fn drop(&mut self) {
        // Signal shutdown to all workers
        self.shutdown.store(true, Ordering::Relaxed);

        // Closing both ends unblocks workers waiting on either channel
        self.task_txs.clear();
        self.output_rxs.clear();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
