//! Error types for the concurrency harness.
//!
//! Attempt-level failures never leave the retry loop, so they have no type
//! of their own here: they are logged and kept as the "last failure" until
//! the wrapper either succeeds or returns [`RetryExhausted`].

use thiserror::Error;

/// Errors raised by the harness itself, before any job runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarnessError {
    /// An argument's scalar/vector status could not be established safely.
    #[error("cannot classify argument `{argument}`: {reason}")]
    ClassificationAmbiguity { argument: String, reason: String },

    /// Vector arguments disagree on length and the strict policy is active.
    #[error("vector arguments have different lengths: {}", describe_lengths(.lengths))]
    LengthMismatch { lengths: Vec<(String, usize)> },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn describe_lengths(lengths: &[(String, usize)]) -> String {
    lengths
        .iter()
        .map(|(name, len)| format!("{name}={len}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every configured attempt of an operation failed.
///
/// Carries the name the operation was registered under and the failure
/// returned by the final attempt.
#[derive(Error, Debug)]
#[error("operation `{operation}` failed after {attempts} attempt(s): {last}")]
pub struct RetryExhausted<E> {
    pub operation: String,
    pub attempts: u32,
    #[source]
    pub last: E,
}

/// Failure of a single job inside a dispatched batch.
#[derive(Error, Debug)]
pub enum JobFailure<E> {
    #[error("job failed: {0}")]
    Failed(#[source] E),

    #[error("job panicked: {0}")]
    Panicked(String),
}

impl<E> JobFailure<E> {
    /// The work function's own error, if the job returned one.
    pub fn as_failed(&self) -> Option<&E> {
        match self {
            JobFailure::Failed(e) => Some(e),
            JobFailure::Panicked(_) => None,
        }
    }
}
