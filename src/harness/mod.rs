//! Concurrency harness: retry a fallible operation, or fan one call of a
//! work function out over a bounded worker pool.
//!
//! # Pieces
//!
//! | Piece | Module | Role |
//! |-------|--------|------|
//! | Retry wrapper | [`retry`] | bounded attempts with a fixed delay |
//! | Argument classifier | [`classify`] | tags each argument scalar or vector |
//! | Job builder | [`jobs`] | one argument set per vector element |
//! | Dispatch pool | [`pool`] | runs jobs, at most `max_workers` at once |
//!
//! [`ThreadHeavy`] ties the last three together:
//!
//! ```ignore
//! let heavy = ThreadHeavy::new(PoolConfig::default().with_return_val(true))?;
//! let squares = heavy
//!     .call(|job: Job<u64>| Ok::<_, io::Error>(job.args[0] * job.args[0]),
//!           CallArgs::new().arg_seq([2, 3, 4]))
//!     .await?
//!     .values(); // {4, 9, 16}, in completion order
//! ```
//!
//! The two compose by calling [`Retry`] inside the work function, so every
//! job gets its own attempt budget.

pub mod classify;
pub mod error;
pub mod jobs;
pub mod pool;
pub mod retry;

use std::error::Error;
use std::future::Future;
use std::sync::Arc;

use tracing::{info, instrument};

pub use classify::{
    Arg, CallArgs, Classifier, Input, JsonClassifier, ObjectPolicy, Opaque, StringPolicy,
};
pub use error::{HarnessError, JobFailure, RetryExhausted};
pub use jobs::{CallSignature, Job, MismatchPolicy};
pub use pool::{
    DispatchReport, Execution, FailureSink, Outcome, PoolConfig, default_max_workers,
};
pub use retry::Retry;

/// Distributes one call of a work function across a worker pool.
///
/// Each call classifies its [`CallArgs`] with the configured
/// [`Classifier`], builds one [`Job`] per vector element and dispatches the
/// jobs. The pool lives for the duration of the call and is drained before
/// the call returns.
#[derive(Clone)]
pub struct ThreadHeavy<C = Opaque> {
    config: PoolConfig,
    classifier: C,
    failure_sink: Option<FailureSink>,
}

impl ThreadHeavy<Opaque> {
    /// Create a harness that treats every argument value as a scalar.
    ///
    /// # Arguments
    /// * `config` - Worker count, result collection and mismatch policy
    ///
    /// # Returns
    /// * `Ok(ThreadHeavy)` - Ready to dispatch
    /// * `Err(HarnessError::InvalidConfig)` - `max_workers` or
    ///   `max_buffered` is zero
    pub fn new(config: PoolConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        Ok(Self {
            config,
            classifier: Opaque,
            failure_sink: None,
        })
    }
}

impl<C> ThreadHeavy<C> {
    /// Swap the argument classifier, e.g. for [`JsonClassifier`] when the
    /// work function takes `serde_json::Value` arguments.
    pub fn with_classifier<D>(self, classifier: D) -> ThreadHeavy<D> {
        ThreadHeavy {
            config: self.config,
            classifier,
            failure_sink: self.failure_sink,
        }
    }

    /// Observe failures of fire-and-forget jobs. Receives the job index and
    /// the failure; it has no effect when outcomes are collected.
    pub fn with_failure_sink<S>(mut self, sink: S) -> Self
    where
        S: Fn(usize, &(dyn Error + 'static)) + Send + Sync + 'static,
    {
        self.failure_sink = Some(Arc::new(sink));
        self
    }

    /// The dispatch settings this harness was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Classify `args` and expand them into jobs without running anything.
    pub fn prepare<T>(&self, args: CallArgs<T>) -> Result<Vec<Job<T>>, HarnessError>
    where
        T: Clone,
        C: Classifier<T>,
    {
        args.classify(&self.classifier, self.config.max_buffered)?
            .build_jobs(self.config.mismatch)
    }

    /// Dispatch a blocking work function, one OS thread per running job.
    ///
    /// Errors only when the arguments cannot be turned into jobs; job
    /// failures are outcomes (or are discarded, see [`pool`]).
    #[instrument(level = "info", skip_all, fields(max_workers = self.config.max_workers, return_val = self.config.return_val))]
    pub async fn call<T, R, E, F>(&self, work: F, args: CallArgs<T>) -> Result<Execution<R, E>, HarnessError>
    where
        C: Classifier<T>,
        T: Clone + Send + 'static,
        R: Send + 'static,
        E: Error + Send + 'static,
        F: Fn(Job<T>) -> Result<R, E> + Send + Sync + 'static,
    {
        let jobs = self.prepare(args)?;
        info!(jobs = jobs.len(), "Dispatching jobs");
        Ok(pool::dispatch_blocking(jobs, Arc::new(work), &self.config, self.failure_sink.as_ref()).await)
    }

    /// Dispatch an async work function; each job runs as its own task on the
    /// multi-threaded runtime.
    #[instrument(level = "info", skip_all, fields(max_workers = self.config.max_workers, return_val = self.config.return_val))]
    pub async fn call_async<T, R, E, F, Fut>(
        &self,
        work: F,
        args: CallArgs<T>,
    ) -> Result<Execution<R, E>, HarnessError>
    where
        C: Classifier<T>,
        T: Clone + Send + 'static,
        R: Send + 'static,
        E: Error + Send + 'static,
        F: Fn(Job<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let jobs = self.prepare(args)?;
        info!(jobs = jobs.len(), "Dispatching async jobs");
        Ok(pool::dispatch_async(jobs, Arc::new(work), &self.config, self.failure_sink.as_ref()).await)
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for ThreadHeavy<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadHeavy")
            .field("config", &self.config)
            .field("classifier", &self.classifier)
            .field("failure_sink", &self.failure_sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    fn square(job: Job<u64>) -> Result<u64, io::Error> {
        let x = job.args[0];
        Ok(x * x)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_square_over_vector() {
        let heavy = ThreadHeavy::new(
            PoolConfig::default()
                .with_max_workers(Some(2))
                .with_return_val(true),
        )
        .unwrap();

        let exec = heavy.call(square, CallArgs::new().arg_seq([2, 3, 4])).await.unwrap();
        let mut values = exec.values();
        values.sort_unstable();
        assert_eq!(values, vec![4, 9, 16]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_outcome_indices_cover_every_job() {
        let heavy = ThreadHeavy::new(PoolConfig::default().with_return_val(true)).unwrap();
        let outcomes = heavy
            .call(square, CallArgs::new().arg_seq(0..20u64))
            .await
            .unwrap()
            .into_ordered();

        assert_eq!(outcomes.len(), 20);
        for (i, outcome) in outcomes.into_iter().enumerate() {
            assert_eq!(outcome.index, i);
            assert_eq!(outcome.ok(), Some((i * i) as u64));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_repeated_calls_are_independent() {
        let heavy = ThreadHeavy::new(PoolConfig::default().with_return_val(true)).unwrap();
        let first = heavy.call(square, CallArgs::new().arg_seq([5, 6, 7])).await.unwrap();
        let second = heavy.call(square, CallArgs::new().arg_seq([5, 6, 7])).await.unwrap();

        let mut a = first.values();
        let mut b = second.values();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a.len(), 3);
        assert_eq!(a, b);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fire_and_forget_returns_no_outcomes_even_on_failure() {
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        let heavy = ThreadHeavy::new(PoolConfig::default())
            .unwrap()
            .with_failure_sink(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let exec = heavy
            .call(
                |_job: Job<u64>| -> Result<(), io::Error> { Err(io::Error::other("nope")) },
                CallArgs::new().arg_seq([1, 2, 3]),
            )
            .await
            .unwrap();

        assert!(!exec.is_collected());
        assert!(exec.outcomes().is_empty());
        assert_eq!(failures.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shared_accumulator_passed_intentionally() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let heavy = ThreadHeavy::new(PoolConfig::default().with_max_workers(Some(4))).unwrap();
        let acc = Arc::clone(&sink);
        heavy
            .call(
                move |job: Job<u64>| -> Result<(), io::Error> {
                    acc.lock()
                        .map_err(|_| io::Error::other("poisoned"))?
                        .push(job.args[0] + job.kwargs["bump"]);
                    Ok(())
                },
                CallArgs::new().arg_seq([1, 2, 3]).kwarg("bump", 10),
            )
            .await
            .unwrap();

        let mut seen = sink.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![11, 12, 13]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_json_classifier_drives_dispatch() {
        let heavy = ThreadHeavy::new(PoolConfig::default().with_return_val(true))
            .unwrap()
            .with_classifier(JsonClassifier::default());

        let exec = heavy
            .call(
                |job: Job<Value>| -> Result<String, io::Error> {
                    Ok(format!("{}:{}", job.args[0].as_str().unwrap_or("?"), job.args[1]))
                },
                CallArgs::new().arg(json!("en")).arg(json!([1, 2])),
            )
            .await
            .unwrap();

        let mut values = exec.values();
        values.sort();
        assert_eq!(values, vec!["en:1".to_string(), "en:2".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_strict_mismatch_fails_before_dispatch() {
        let heavy = ThreadHeavy::new(
            PoolConfig::default()
                .with_return_val(true)
                .with_mismatch(MismatchPolicy::Strict),
        )
        .unwrap();
        let err = heavy
            .call(square, CallArgs::new().arg_seq([1, 2]).kwarg_seq("k", [1, 2, 3]))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::LengthMismatch { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_retry_inside_async_jobs() {
        let calls = Arc::new(AtomicU32::new(0));
        let retry = Retry::new("flaky").with_delay(Duration::ZERO);
        let heavy = ThreadHeavy::new(PoolConfig::default().with_return_val(true)).unwrap();

        let counter = Arc::clone(&calls);
        let exec = heavy
            .call_async(
                move |job: Job<u32>| {
                    let retry = retry.clone();
                    let counter = Arc::clone(&counter);
                    async move {
                        let mut attempt = 0;
                        retry
                            .call_async(|| {
                                attempt += 1;
                                counter.fetch_add(1, Ordering::SeqCst);
                                let result = if attempt < 2 {
                                    Err(io::Error::other("transient"))
                                } else {
                                    Ok(job.args[0])
                                };
                                async move { result }
                            })
                            .await
                    }
                },
                CallArgs::new().arg_seq([1, 2, 3]),
            )
            .await
            .unwrap();

        let outcomes = exec.into_ordered();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(Outcome::is_ok));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }
}
