//! Recompute worker pool.
//!
//! Priority-ordered task queue drained by a fixed set of worker threads.
//! Used in background recompute mode: deletes of non-invertible statistics
//! submit the recompute here and return while the statistics are dirty.

use geostats_core::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use thiserror::Error as ThisError;
use tracing::{debug, error, warn};

/// Priority levels for recompute work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskPriority {
    /// Crash recovery sweeps
    Low = 0,
    /// Recomputes owed by deletes
    Normal = 1,
    /// Explicitly requested recomputes
    High = 2,
}

/// Error returned when the task queue is full or shut down.
#[derive(Debug, ThisError)]
#[error("recompute queue is full")]
pub struct BackpressureError;

/// Scheduler metrics snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Number of tasks waiting in the queue.
    pub queue_depth: usize,
    /// Number of tasks currently being executed by workers.
    pub active_tasks: usize,
    /// Total number of tasks finished since scheduler creation.
    pub tasks_completed: u64,
    /// Finished tasks that returned an error or panicked.
    pub tasks_failed: u64,
    /// Number of worker threads.
    pub worker_count: usize,
}

type Work = Box<dyn FnOnce() -> Result<()> + Send>;

/// A queued recompute
struct Job {
    priority: TaskPriority,
    /// Submission order, for FIFO within a priority
    seq: u64,
    label: String,
    work: Work,
}

impl Job {
    fn key(&self) -> (TaskPriority, std::cmp::Reverse<u64>) {
        (self.priority, std::cmp::Reverse(self.seq))
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// State shared by the handle and its workers
struct Pool {
    jobs: Mutex<BinaryHeap<Job>>,
    /// Signalled when a job is pushed or on shutdown
    has_work: Condvar,
    /// Signalled when the pool goes idle
    idle: Condvar,
    closed: AtomicBool,
    next_seq: AtomicU64,
    capacity: usize,
    pending: AtomicUsize,
    running: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl Pool {
    fn new(capacity: usize) -> Self {
        Pool {
            jobs: Mutex::new(BinaryHeap::new()),
            has_work: Condvar::new(),
            idle: Condvar::new(),
            closed: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            capacity,
            pending: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    fn is_idle(&self) -> bool {
        self.pending.load(AtomicOrdering::Acquire) == 0
            && self.running.load(AtomicOrdering::Acquire) == 0
    }

    /// Block for the next job; `None` once closed and empty
    fn next_job(&self) -> Option<Job> {
        let mut jobs = self.jobs.lock();
        loop {
            if let Some(job) = jobs.pop() {
                self.pending.fetch_sub(1, AtomicOrdering::Release);
                self.running.fetch_add(1, AtomicOrdering::Release);
                return Some(job);
            }
            if self.closed.load(AtomicOrdering::Acquire) {
                return None;
            }
            self.has_work.wait(&mut jobs);
        }
    }

    fn run(&self, job: Job) {
        let _running = Running { pool: self };
        let started = Instant::now();
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(job.work)) {
            Ok(Ok(())) => {
                debug!(
                    target: "geostats::recompute",
                    task = %job.label,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Recompute task done"
                );
            }
            Ok(Err(e)) => {
                self.failed.fetch_add(1, AtomicOrdering::Relaxed);
                warn!(target: "geostats::recompute", task = %job.label, error = %e, "Recompute task failed");
            }
            Err(payload) => {
                self.failed.fetch_add(1, AtomicOrdering::Relaxed);
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|m| m.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic".to_string());
                error!(target: "geostats::recompute", task = %job.label, panic = %message, "Recompute task panicked");
            }
        }
    }
}

/// Marks a job finished even if it panicked, so `drain()` cannot hang
struct Running<'a> {
    pool: &'a Pool,
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.pool.completed.fetch_add(1, AtomicOrdering::Relaxed);
        self.pool.running.fetch_sub(1, AtomicOrdering::Release);
        if self.pool.is_idle() {
            // Waiters check idleness under the queue lock
            let _jobs = self.pool.jobs.lock();
            self.pool.idle.notify_all();
        }
    }
}

/// Priority worker pool for recompute tasks.
///
/// Higher-priority tasks run first; within the same priority, tasks run in
/// FIFO order. A failing task is logged and counted; the worker survives.
pub struct RecomputeScheduler {
    pool: Arc<Pool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl RecomputeScheduler {
    /// Start `workers` threads over a queue holding at most `capacity` tasks.
    ///
    /// Workers are named `geostats-recompute-0`, `geostats-recompute-1`, etc.
    ///
    /// # Errors
    ///
    /// Returns `Io` if a worker thread cannot be spawned; workers already
    /// started are shut down.
    pub fn new(workers: usize, capacity: usize) -> Result<Self> {
        let scheduler = RecomputeScheduler {
            pool: Arc::new(Pool::new(capacity)),
            workers: Mutex::new(Vec::with_capacity(workers)),
            worker_count: workers,
        };
        for i in 0..workers {
            let pool = Arc::clone(&scheduler.pool);
            let spawned = std::thread::Builder::new()
                .name(format!("geostats-recompute-{}", i))
                .spawn(move || {
                    while let Some(job) = pool.next_job() {
                        pool.run(job);
                    }
                });
            match spawned {
                Ok(handle) => scheduler.workers.lock().push(handle),
                Err(e) => {
                    scheduler.shutdown();
                    return Err(Error::Io(e));
                }
            }
        }
        Ok(scheduler)
    }

    /// Queue a task.
    ///
    /// `label` names the task in logs. Returns `Err(BackpressureError)` if
    /// the queue is at capacity or the scheduler has been shut down.
    pub fn submit(
        &self,
        priority: TaskPriority,
        label: impl Into<String>,
        work: impl FnOnce() -> Result<()> + Send + 'static,
    ) -> std::result::Result<(), BackpressureError> {
        let pool = &self.pool;
        // Workers are joined after shutdown; the task would never run
        if pool.closed.load(AtomicOrdering::Acquire)
            || pool.pending.load(AtomicOrdering::Acquire) >= pool.capacity
        {
            return Err(BackpressureError);
        }

        let job = Job {
            priority,
            seq: pool.next_seq.fetch_add(1, AtomicOrdering::Relaxed),
            label: label.into(),
            work: Box::new(work),
        };
        {
            let mut jobs = pool.jobs.lock();
            jobs.push(job);
            pool.pending.fetch_add(1, AtomicOrdering::Release);
        }
        pool.has_work.notify_one();
        Ok(())
    }

    /// Block until all queued and in-flight tasks have finished.
    ///
    /// Workers keep running afterwards.
    pub fn drain(&self) {
        let mut jobs = self.pool.jobs.lock();
        while !self.pool.is_idle() {
            self.pool.idle.wait(&mut jobs);
        }
    }

    /// Stop accepting tasks, let workers empty the queue, and join them.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        self.pool.closed.store(true, AtomicOrdering::Release);
        {
            // A worker between its closed check and its wait holds this lock
            let _jobs = self.pool.jobs.lock();
            self.pool.has_work.notify_all();
        }

        for handle in self.workers.lock().drain(..) {
            if handle.join().is_err() {
                warn!(target: "geostats::recompute", "Recompute worker exited abnormally");
            }
        }
    }

    /// Check if shutdown has been requested
    pub fn is_shut_down(&self) -> bool {
        self.pool.closed.load(AtomicOrdering::Acquire)
    }

    /// Counters snapshot
    pub fn stats(&self) -> SchedulerStats {
        let pool = &self.pool;
        SchedulerStats {
            queue_depth: pool.pending.load(AtomicOrdering::Relaxed),
            active_tasks: pool.running.load(AtomicOrdering::Relaxed),
            tasks_completed: pool.completed.load(AtomicOrdering::Relaxed),
            tasks_failed: pool.failed.load(AtomicOrdering::Relaxed),
            worker_count: self.worker_count,
        }
    }
}

impl std::fmt::Debug for RecomputeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecomputeScheduler")
            .field("capacity", &self.pool.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}
