//! Bounded retry with a fixed pause between attempts.
//!
//! [`Retry`] wraps any fallible operation: it runs the operation, returns the
//! first success, and otherwise tries again after `delay` until `attempts`
//! runs have failed. Exhaustion is reported as [`RetryExhausted`] carrying
//! the last failure; it is never swallowed.
//!
//! Three flavors share the same loop:
//! - [`Retry::call`] for blocking operations (sleeps the current thread)
//! - [`Retry::call_async`] for futures (sleeps with `tokio::time::sleep`)
//! - [`Retry::collect`] for operations producing a sequence of items, where
//!   a failed attempt's partial output is discarded before the next attempt
//!
//! ```ignore
//! let retry = Retry::new("download").with_attempts(5)?.with_delay(Duration::ZERO);
//! let body = retry.call_async(|| fetch(&client, url)).await?;
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{error, warn};

use super::error::{HarnessError, RetryExhausted};

/// Attempts made when none are configured.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Pause between attempts when none is configured.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(250);

/// Retry configuration for one named operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retry {
    operation: String,
    attempts: u32,
    delay: Duration,
}

impl Retry {
    /// A retry wrapper with the default 3 attempts and 0.25 s delay.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }

    /// Set the total number of attempts. `1` disables retrying.
    pub fn with_attempts(mut self, attempts: u32) -> Result<Self, HarnessError> {
        if attempts == 0 {
            return Err(HarnessError::InvalidConfig(format!(
                "retry `{}` needs at least one attempt",
                self.operation
            )));
        }
        self.attempts = attempts;
        Ok(self)
    }

    /// Set the pause between two attempts. No pause follows the final one.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the delay from fractional seconds, as found in config files.
    pub fn with_delay_secs(self, secs: f64) -> Result<Self, HarnessError> {
        let delay = Duration::try_from_secs_f64(secs).map_err(|_| {
            HarnessError::InvalidConfig(format!(
                "retry `{}` delay must be a non-negative number of seconds, got {secs}",
                self.operation
            ))
        })?;
        Ok(self.with_delay(delay))
    }

    /// Name used in log events and in [`RetryExhausted::operation`].
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Total attempts, first one included.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Pause between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run a blocking operation until it succeeds or attempts run out.
    ///
    /// # Arguments
    /// * `op` - Called once per attempt
    ///
    /// # Returns
    /// * `Ok(T)` - The first successful result
    /// * `Err(RetryExhausted)` - Every attempt failed; carries the last error
    pub fn call<T, E, F>(&self, mut op: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: std::error::Error + 'static,
    {
        let mut ctx = RetryContext::new(self);
        loop {
            ctx.begin();
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let delay = ctx.record(e)?;
                    std::thread::sleep(delay);
                }
            }
        }
    }

    /// Async flavor of [`Retry::call`]. `op` is invoked once per attempt to
    /// build a fresh future.
    pub async fn call_async<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let mut ctx = RetryContext::new(self);
        loop {
            ctx.begin();
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let delay = ctx.record(e)?;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Run a sequence-producing operation and return everything it yielded.
    ///
    /// Items of the current attempt are buffered; the first `Err` item fails
    /// the attempt and throws the buffer away, so a caller never sees output
    /// from an attempt that did not finish.
    pub fn collect<T, E, F, I>(&self, mut op: F) -> Result<Vec<T>, RetryExhausted<E>>
    where
        F: FnMut() -> I,
        I: IntoIterator<Item = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        self.call(|| op().into_iter().collect::<Result<Vec<T>, E>>())
    }
}

/// Per-call attempt bookkeeping.
struct RetryContext<'a> {
    retry: &'a Retry,
    attempt: u32,
    started: Instant,
}

impl<'a> RetryContext<'a> {
    fn new(retry: &'a Retry) -> Self {
        Self {
            retry,
            attempt: 0,
            started: Instant::now(),
        }
    }

    fn begin(&mut self) {
        self.attempt += 1;
    }

    /// Record a failed attempt: the delay before the next attempt, or the
    /// terminal error once attempts are used up.
    fn record<E>(&self, e: E) -> Result<Duration, RetryExhausted<E>>
    where
        E: std::error::Error + 'static,
    {
        let elapsed_ms_total = self.started.elapsed().as_millis();
        if self.attempt >= self.retry.attempts {
            error!(
                operation = %self.retry.operation,
                attempt = self.attempt,
                max = self.retry.attempts,
                elapsed_ms_total,
                error = %e,
                "operation exhausted retries"
            );
            return Err(RetryExhausted {
                operation: self.retry.operation.clone(),
                attempts: self.attempt,
                last: e,
            });
        }

        warn!(
            operation = %self.retry.operation,
            attempt = self.attempt,
            max = self.retry.attempts,
            elapsed_ms_total,
            delay = %DisplayDelay(self.retry.delay),
            error = %e,
            "operation failed; retrying"
        );
        Ok(self.retry.delay)
    }
}

struct DisplayDelay(Duration);

impl Display for DisplayDelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.0.as_secs_f64())
    }
}
