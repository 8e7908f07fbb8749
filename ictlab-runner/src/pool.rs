//! Parallel execution pool.
//!
//! Tasks are independent: each one reads shared, immutable inputs and returns
//! one value. A panic inside a task is caught at the task boundary and handed
//! back as [`TaskPanic`]; it never takes down the pool or its siblings.
//!
//! Cancellation is cooperative. Once the token is set no further task starts;
//! tasks already running finish and their results are returned.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
}

/// Shared stop flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A task that panicked, with the panic payload rendered as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPanic(pub String);

impl TaskPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked".to_string()
        };
        Self(message)
    }
}

/// One finished task: its position in the submitted slice and its outcome.
#[derive(Debug)]
pub struct Completed<R> {
    pub index: usize,
    pub outcome: Result<R, TaskPanic>,
}

/// Task-submission interface for the optimization driver.
///
/// Implementations may run tasks in any order and on any thread. They return
/// one [`Completed`] per task that was started; tasks skipped because of
/// cancellation are absent.
pub trait TaskExecutor: Send + Sync {
    fn execute<T, R, F>(
        &self,
        tasks: &[T],
        work: F,
        cancel: &CancelToken,
        on_complete: &(dyn Fn(&Result<R, TaskPanic>) + Sync),
    ) -> Vec<Completed<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync;

    fn workers(&self) -> usize;
}

fn run_isolated<T, R>(
    index: usize,
    task: &T,
    work: &(impl Fn(&T) -> R + Sync),
    cancel: &CancelToken,
    on_complete: &(dyn Fn(&Result<R, TaskPanic>) + Sync),
) -> Option<Completed<R>> {
    if cancel.is_cancelled() {
        return None;
    }
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(task))).map_err(TaskPanic::from_payload);
    on_complete(&outcome);
    Some(Completed { index, outcome })
}

/// Default worker count: available cores minus one, at least one.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Fixed-size rayon pool.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        if workers == 0 {
            return Err(PoolError::ZeroWorkers);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ictlab-worker-{i}"))
            .build()?;
        Ok(Self { pool, workers })
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("workers", &self.workers).finish()
    }
}

impl TaskExecutor for WorkerPool {
    fn execute<T, R, F>(
        &self,
        tasks: &[T],
        work: F,
        cancel: &CancelToken,
        on_complete: &(dyn Fn(&Result<R, TaskPanic>) + Sync),
    ) -> Vec<Completed<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        self.pool.install(|| {
            tasks
                .par_iter()
                .enumerate()
                .filter_map(|(i, task)| run_isolated(i, task, &work, cancel, on_complete))
                .collect()
        })
    }

    fn workers(&self) -> usize {
        self.workers
    }
}

/// Runs every task on the calling thread, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn execute<T, R, F>(
        &self,
        tasks: &[T],
        work: F,
        cancel: &CancelToken,
        on_complete: &(dyn Fn(&Result<R, TaskPanic>) + Sync),
    ) -> Vec<Completed<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        tasks
            .iter()
            .enumerate()
            .map_while(|(i, task)| run_isolated(i, task, &work, cancel, on_complete))
            .collect()
    }

    fn workers(&self) -> usize {
        1
    }
}
