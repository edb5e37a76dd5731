//! Bounded-concurrency execution of a batch of jobs.
//!
//! Jobs are fed lazily into `buffer_unordered(max_workers)`, so at most
//! `max_workers` of them are running at any time and the rest wait in the
//! queue. Each running job occupies an OS thread: blocking work functions go
//! to tokio's blocking pool, async ones are spawned on the multi-threaded
//! runtime. Outcomes arrive in completion order.
//!
//! # Fire-and-forget
//!
//! Without result collection the dispatch still waits for every job before
//! returning, but job outcomes are not handed back. Failures are logged,
//! counted in the [`DispatchReport`] and passed to the optional failure
//! sink, nothing more. **A fire-and-forget dispatch that returns `Ok` says
//! nothing about whether any job succeeded.**

use std::error::Error;
use std::future::{Future, ready};
use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::task::JoinError;
use tracing::{debug, warn};

use super::error::{HarnessError, JobFailure};
use super::jobs::{Job, MismatchPolicy};

/// Upper bound of the default worker count.
pub const DEFAULT_WORKER_CAP: usize = 32;

/// Longest one-shot sequence an argument may buffer.
pub const DEFAULT_MAX_BUFFERED: usize = 100_000;

/// `min(32, available parallelism + 4)`.
pub fn default_max_workers() -> usize {
    let units = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    (units + 4).min(DEFAULT_WORKER_CAP)
}

/// Dispatch settings for one [`ThreadHeavy`](super::ThreadHeavy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_workers: usize,
    /// Collect and return job outcomes.
    pub return_val: bool,
    pub mismatch: MismatchPolicy,
    pub max_buffered: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            return_val: false,
            mismatch: MismatchPolicy::default(),
            max_buffered: DEFAULT_MAX_BUFFERED,
        }
    }
}

impl PoolConfig {
    /// `None` keeps the default worker policy.
    pub fn with_max_workers(mut self, max_workers: Option<usize>) -> Self {
        if let Some(n) = max_workers {
            self.max_workers = n;
        }
        self
    }

    /// Collect job outcomes (`true`) or fire and forget (`false`).
    pub fn with_return_val(mut self, return_val: bool) -> Self {
        self.return_val = return_val;
        self
    }

    /// Policy for vector arguments of different lengths.
    pub fn with_mismatch(mut self, mismatch: MismatchPolicy) -> Self {
        self.mismatch = mismatch;
        self
    }

    /// Reject settings the pool cannot run with.
    ///
    /// # Returns
    /// * `Err(HarnessError::InvalidConfig)` - `max_workers` or
    ///   `max_buffered` is zero
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.max_workers == 0 {
            return Err(HarnessError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.max_buffered == 0 {
            return Err(HarnessError::InvalidConfig(
                "max_buffered must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of one job, tagged with the job's index.
#[derive(Debug)]
pub struct Outcome<R, E> {
    pub index: usize,
    pub result: Result<R, JobFailure<E>>,
}

impl<R, E> Outcome<R, E> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn ok(self) -> Option<R> {
        self.result.ok()
    }
}

/// What a fire-and-forget dispatch reports back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub submitted: usize,
    pub failed: usize,
}

/// Outcome of a whole dispatch.
#[derive(Debug)]
pub enum Execution<R, E> {
    /// Fire-and-forget: no outcomes retained.
    Acknowledged(DispatchReport),
    /// Every job's outcome, in completion order.
    Collected(Vec<Outcome<R, E>>),
}

impl<R, E> Execution<R, E> {
    /// Whether outcomes were kept.
    pub fn is_collected(&self) -> bool {
        matches!(self, Execution::Collected(_))
    }

    /// Outcomes in completion order; empty for fire-and-forget.
    pub fn outcomes(self) -> Vec<Outcome<R, E>> {
        match self {
            Execution::Collected(outcomes) => outcomes,
            Execution::Acknowledged(_) => Vec::new(),
        }
    }

    /// Outcomes sorted back into job order.
    pub fn into_ordered(self) -> Vec<Outcome<R, E>> {
        let mut outcomes = self.outcomes();
        outcomes.sort_by_key(|o| o.index);
        outcomes
    }

    /// Successful values in completion order, dropping failures.
    pub fn values(self) -> Vec<R> {
        self.outcomes().into_iter().filter_map(Outcome::ok).collect()
    }
}

/// Observer for job failures that would otherwise go unseen.
pub type FailureSink = Arc<dyn Fn(usize, &(dyn Error + 'static)) + Send + Sync>;

/// Run blocking jobs, one OS thread each, at most `max_workers` at a time.
pub(crate) async fn dispatch_blocking<T, R, E, F>(
    jobs: Vec<Job<T>>,
    work: Arc<F>,
    config: &PoolConfig,
    sink: Option<&FailureSink>,
) -> Execution<R, E>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Error + Send + 'static,
    F: Fn(Job<T>) -> Result<R, E> + Send + Sync + 'static,
{
    let submitted = jobs.len();
    let runs = stream::iter(jobs)
        .map(move |job| {
            let work = Arc::clone(&work);
            let index = job.index;
            let handle = tokio::task::spawn_blocking(move || work(job));
            async move { settle(index, handle.await) }
        })
        .buffer_unordered(config.max_workers);
    drain(runs, submitted, config.return_val, sink).await
}

/// Run async jobs as tasks on the runtime, at most `max_workers` at a time.
pub(crate) async fn dispatch_async<T, R, E, F, Fut>(
    jobs: Vec<Job<T>>,
    work: Arc<F>,
    config: &PoolConfig,
    sink: Option<&FailureSink>,
) -> Execution<R, E>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Error + Send + 'static,
    F: Fn(Job<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let submitted = jobs.len();
    let runs = stream::iter(jobs)
        .map(move |job| {
            let index = job.index;
            let handle = tokio::spawn(work(job));
            async move { settle(index, handle.await) }
        })
        .buffer_unordered(config.max_workers);
    drain(runs, submitted, config.return_val, sink).await
}

fn settle<R, E>(index: usize, joined: Result<Result<R, E>, JoinError>) -> Outcome<R, E> {
    let result = match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(JobFailure::Failed(e)),
        Err(join_err) => Err(JobFailure::Panicked(join_err.to_string())),
    };
    Outcome { index, result }
}

async fn drain<S, R, E>(
    runs: S,
    submitted: usize,
    return_val: bool,
    sink: Option<&FailureSink>,
) -> Execution<R, E>
where
    S: Stream<Item = Outcome<R, E>>,
    E: Error + 'static,
{
    if return_val {
        let outcomes: Vec<Outcome<R, E>> = runs.collect().await;
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        debug!(submitted, failed, "Collected job outcomes");
        return Execution::Collected(outcomes);
    }

    let mut report = DispatchReport {
        submitted,
        failed: 0,
    };
    runs.for_each(|outcome| {
        if let Err(failure) = &outcome.result {
            report.failed += 1;
            warn!(job = outcome.index, error = %failure, "Job failed; outcome discarded");
            if let Some(sink) = sink {
                sink(outcome.index, failure as &(dyn Error + 'static));
            }
        }
        ready(())
    })
    .await;
    debug!(submitted, failed = report.failed, "Fire-and-forget dispatch drained");
    Execution::Acknowledged(report)
}
