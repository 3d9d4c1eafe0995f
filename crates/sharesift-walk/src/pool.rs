//! Work pools for file-scan and directory-walk jobs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use sharesift_core::WalkConfig;
use thiserror::Error;
use tracing::{debug, error};

/// A unit of work submitted to a pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors from building or submitting to a work pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool was cancelled and accepts no more work.
    #[error("The {pool} pool has been cancelled")]
    Cancelled { pool: &'static str },

    /// The underlying thread pool could not be created.
    #[error("Failed to build the {pool} pool: {source}")]
    Build {
        pool: &'static str,
        #[source]
        source: ThreadPoolBuildError,
    },
}

/// Accepts jobs and runs them asynchronously, in isolation from each other.
///
/// Submitting never waits for the job to run, though an implementation may
/// block the submitter briefly to apply backpressure.
pub trait TaskPool: Send + Sync {
    fn submit(&self, job: Job) -> Result<(), PoolError>;
}

#[derive(Debug, Default)]
struct PoolState {
    in_flight: Mutex<usize>,
    changed: Condvar,
    cancelled: AtomicBool,
}

impl PoolState {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, usize>) -> MutexGuard<'a, usize> {
        self.changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decrements the in-flight count when a job finishes, even by panicking.
struct InFlightGuard(Arc<PoolState>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut in_flight = self.0.lock();
        *in_flight = in_flight.saturating_sub(1);
        self.0.changed.notify_all();
    }
}

/// A dedicated rayon thread pool with in-flight tracking and cancellation.
pub struct WorkPool {
    name: &'static str,
    pool: ThreadPool,
    state: Arc<PoolState>,
    max_backlog: usize,
}

impl WorkPool {
    /// Create a pool.
    ///
    /// `threads` of 0 lets rayon pick; `max_backlog` of 0 never blocks
    /// submitters.
    pub fn new(name: &'static str, threads: usize, max_backlog: usize) -> Result<Self, PoolError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |idx| format!("{name}-{idx}"))
            .panic_handler(move |payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(pool = name, %message, "Work item panicked");
            })
            .build()
            .map_err(|source| PoolError::Build { pool: name, source })?;

        Ok(Self {
            name,
            pool,
            state: Arc::new(PoolState::default()),
            max_backlog,
        })
    }

    /// Name used in thread names and log lines.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of jobs queued or running.
    pub fn in_flight(&self) -> usize {
        *self.state.lock()
    }

    /// Check if no job is queued or running.
    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Refuse new work and skip queued jobs that have not started.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        let _guard = self.state.lock();
        self.state.changed.notify_all();
        debug!(pool = self.name, "Pool cancelled");
    }

    /// Check if the pool has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Block until no job is queued or running.
    pub fn wait_idle(&self) {
        let mut in_flight = self.state.lock();
        while *in_flight > 0 {
            in_flight = self.state.wait(in_flight);
        }
    }

    fn admit(&self) -> Result<(), PoolError> {
        let cancelled = || PoolError::Cancelled { pool: self.name };
        if self.is_cancelled() {
            return Err(cancelled());
        }

        let mut in_flight = self.state.lock();
        // Workers of this pool never block on it, or a full pool could
        // wait on itself forever.
        if self.max_backlog > 0 && self.pool.current_thread_index().is_none() {
            while *in_flight >= self.max_backlog && !self.is_cancelled() {
                in_flight = self.state.wait(in_flight);
            }
        }
        if self.is_cancelled() {
            return Err(cancelled());
        }
        *in_flight += 1;
        Ok(())
    }
}

impl TaskPool for WorkPool {
    fn submit(&self, job: Job) -> Result<(), PoolError> {
        self.admit()?;

        let guard = InFlightGuard(self.state.clone());
        let state = self.state.clone();
        self.pool.spawn(move || {
            let _guard = guard;
            if state.cancelled.load(Ordering::SeqCst) {
                return;
            }
            job();
        });
        Ok(())
    }
}

impl std::fmt::Debug for WorkPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkPool")
            .field("name", &self.name)
            .field("threads", &self.pool.current_num_threads())
            .field("max_backlog", &self.max_backlog)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// The two independent pools a walk runs on.
#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Runs file-scan jobs.
    pub files: Arc<WorkPool>,
    /// Runs directory-walk jobs.
    pub trees: Arc<WorkPool>,
}

impl Scheduler {
    /// Build both pools from walker configuration.
    pub fn from_config(config: &WalkConfig) -> Result<Self, PoolError> {
        Ok(Self {
            files: Arc::new(WorkPool::new("file", config.file_threads, config.max_file_backlog)?),
            trees: Arc::new(WorkPool::new("tree", config.tree_threads, config.max_tree_backlog)?),
        })
    }

    /// Block until both pools have drained.
    ///
    /// Directory jobs create file jobs but not the other way round, so the
    /// tree pool is drained first.
    pub fn wait_idle(&self) {
        loop {
            self.trees.wait_idle();
            self.files.wait_idle();
            if self.trees.is_idle() && self.files.is_idle() {
                break;
            }
        }
    }

    /// Cancel both pools.
    pub fn cancel(&self) {
        self.trees.cancel();
        self.files.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_jobs_run_and_drain() {
        let pool = WorkPool::new("test", 2, 0).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let counter = counter.clone();
            pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }))
            .unwrap();
        }
        pool.wait_idle();

        assert_eq!(counter.load(Ordering::Relaxed), 50);
        assert!(pool.is_idle());
    }

    #[test]
    fn test_cancelled_pool_refuses_work() {
        let pool = WorkPool::new("test", 1, 0).unwrap();
        pool.cancel();

        let result = pool.submit(Box::new(|| {}));
        assert!(matches!(result, Err(PoolError::Cancelled { pool: "test" })));
        assert!(pool.is_idle());
    }

    #[test]
    fn test_panicking_job_is_isolated() {
        let pool = WorkPool::new("test", 1, 0).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        pool.submit(Box::new(|| panic!("bad job"))).unwrap();
        let after = counter.clone();
        pool.submit(Box::new(move || {
            after.fetch_add(1, Ordering::Relaxed);
        }))
        .unwrap();
        pool.wait_idle();

        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_backlog_does_not_deadlock_self_submission() {
        let pool = Arc::new(WorkPool::new("test", 1, 1).unwrap());
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_pool = pool.clone();
        let inner_counter = counter.clone();
        pool.submit(Box::new(move || {
            for _ in 0..5 {
                let counter = inner_counter.clone();
                inner_pool
                    .submit(Box::new(move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }))
                    .unwrap();
            }
        }))
        .unwrap();
        pool.wait_idle();

        assert_eq!(counter.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_scheduler_from_config() {
        let config = WalkConfig::builder()
            .file_threads(2usize)
            .tree_threads(1usize)
            .build()
            .unwrap();
        let scheduler = Scheduler::from_config(&config).unwrap();
        scheduler.wait_idle();

        assert_eq!(scheduler.files.name(), "file");
        assert_eq!(scheduler.trees.name(), "tree");
    }
}
