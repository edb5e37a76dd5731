//! Turning a classified call into per-job argument sets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::classify::Arg;
use super::error::HarnessError;

/// What to do when vector arguments disagree on length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Log a warning and run as many jobs as the shortest vector allows.
    #[default]
    Truncate,
    /// Refuse the call with [`HarnessError::LengthMismatch`].
    Strict,
}

/// Every classified argument of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSignature<T> {
    positional: Vec<Arg<T>>,
    keyword: Vec<(String, Arg<T>)>,
}

/// One fully resolved argument set.
#[derive(Debug, Clone, PartialEq)]
pub struct Job<T> {
    /// Position of this job in the batch, `0..job_count`.
    pub index: usize,
    /// Scalar positionals first, then one element of each vector positional.
    pub args: Vec<T>,
    pub kwargs: BTreeMap<String, T>,
}

impl<T> Job<T> {
    pub fn arg(&self, i: usize) -> Option<&T> {
        self.args.get(i)
    }

    pub fn kwarg(&self, name: &str) -> Option<&T> {
        self.kwargs.get(name)
    }
}

impl<T> CallSignature<T> {
    pub fn new(positional: Vec<Arg<T>>, keyword: Vec<(String, Arg<T>)>) -> Self {
        Self {
            positional,
            keyword,
        }
    }

    pub fn positional(&self) -> &[Arg<T>] {
        &self.positional
    }

    pub fn keyword(&self) -> &[(String, Arg<T>)] {
        &self.keyword
    }

    /// `(name, length)` of every vector argument; positionals are named
    /// `arg{i}` after their original position.
    pub fn vector_lengths(&self) -> Vec<(String, usize)> {
        let positional = self
            .positional
            .iter()
            .enumerate()
            .filter(|(_, arg)| arg.is_vector())
            .map(|(i, arg)| (format!("arg{i}"), arg.len()));
        let keyword = self
            .keyword
            .iter()
            .filter(|(_, arg)| arg.is_vector())
            .map(|(name, arg)| (name.clone(), arg.len()));
        positional.chain(keyword).collect()
    }

    /// Shortest vector length, or 1 when every argument is a scalar.
    pub fn job_count(&self) -> usize {
        self.vector_lengths()
            .into_iter()
            .map(|(_, len)| len)
            .min()
            .unwrap_or(1)
    }
}

impl<T: Clone> CallSignature<T> {
    /// Expand the signature into jobs.
    ///
    /// Job `i` receives every scalar unchanged and the `i`-th element of
    /// every vector. Scalars are cloned into each job, so jobs never observe
    /// each other unless a scalar is itself a shared handle.
    pub fn build_jobs(self, policy: MismatchPolicy) -> Result<Vec<Job<T>>, HarnessError> {
        let lengths = self.vector_lengths();
        let count = self.job_count();

        if lengths.iter().any(|(_, len)| *len != count) {
            match policy {
                MismatchPolicy::Strict => return Err(HarnessError::LengthMismatch { lengths }),
                MismatchPolicy::Truncate => warn!(
                    ?lengths,
                    jobs = count,
                    "vector arguments differ in length; truncating to the shortest"
                ),
            }
        }

        let mut scalar_args = Vec::new();
        let mut vector_args = Vec::new();
        for arg in self.positional {
            match arg {
                Arg::Scalar(value) => scalar_args.push(value),
                Arg::Vector(items) => vector_args.push(items.into_iter()),
            }
        }

        let mut scalar_kwargs = BTreeMap::new();
        let mut vector_kwargs = Vec::new();
        for (name, arg) in self.keyword {
            match arg {
                Arg::Scalar(value) => {
                    scalar_kwargs.insert(name, value);
                }
                Arg::Vector(items) => vector_kwargs.push((name, items.into_iter())),
            }
        }

        debug!(
            jobs = count,
            scalar_args = scalar_args.len(),
            vector_args = vector_args.len(),
            scalar_kwargs = scalar_kwargs.len(),
            vector_kwargs = vector_kwargs.len(),
            "Built call signature"
        );

        // Every vector holds at least `count` items, so `next()` never runs dry
        // inside the loop.
        let jobs = (0..count)
            .map(|index| {
                let mut args = scalar_args.clone();
                args.extend(vector_args.iter_mut().filter_map(Iterator::next));

                let mut kwargs = scalar_kwargs.clone();
                kwargs.extend(
                    vector_kwargs
                        .iter_mut()
                        .filter_map(|(name, items)| items.next().map(|v| (name.clone(), v))),
                );

                Job {
                    index,
                    args,
                    kwargs,
                }
            })
            .collect();
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::classify::{CallArgs, Opaque};
    use proptest::prelude::*;

    fn jobs_for(args: CallArgs<i64>, policy: MismatchPolicy) -> Result<Vec<Job<i64>>, HarnessError> {
        args.classify(&Opaque, 1_000)?.build_jobs(policy)
    }

    #[test]
    fn test_scalars_only_is_one_job() {
        let jobs = jobs_for(CallArgs::new().arg(1).kwarg("k", 2), MismatchPolicy::Strict).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].args, vec![1]);
        assert_eq!(jobs[0].kwarg("k"), Some(&2));
    }

    #[test]
    fn test_scalar_positionals_come_first() {
        let jobs = jobs_for(
            CallArgs::new().arg_seq([10, 20]).arg(1).arg_seq([30, 40]).arg(2),
            MismatchPolicy::Strict,
        )
        .unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].args, vec![1, 2, 10, 30]);
        assert_eq!(jobs[1].args, vec![1, 2, 20, 40]);
    }

    #[test]
    fn test_keyword_vectors_merge_with_scalar_kwargs() {
        let jobs = jobs_for(
            CallArgs::new()
                .arg_seq([1, 2, 3])
                .kwarg("scale", 10)
                .kwarg_seq("offset", [100, 200, 300]),
            MismatchPolicy::Strict,
        )
        .unwrap();
        assert_eq!(jobs.len(), 3);
        for (i, job) in jobs.iter().enumerate() {
            assert_eq!(job.index, i);
            assert_eq!(job.args, vec![i as i64 + 1]);
            assert_eq!(job.kwarg("scale"), Some(&10));
            assert_eq!(job.kwarg("offset"), Some(&((i as i64 + 1) * 100)));
        }
    }

    #[test]
    fn test_positional_only_path_matches_general_path() {
        let positional = jobs_for(
            CallArgs::new().arg(7).arg_seq([1, 2]).kwarg("k", 3),
            MismatchPolicy::Strict,
        )
        .unwrap();
        let general = jobs_for(
            CallArgs::new()
                .arg(7)
                .arg_seq([1, 2])
                .kwarg("k", 3)
                .kwarg_seq("extra", [0, 0]),
            MismatchPolicy::Strict,
        )
        .unwrap();
        assert_eq!(positional.len(), general.len());
        for (p, g) in positional.iter().zip(&general) {
            assert_eq!(p.args, g.args);
            assert_eq!(p.kwarg("k"), g.kwarg("k"));
        }
    }

    #[test]
    fn test_empty_vector_yields_no_jobs() {
        let jobs = jobs_for(
            CallArgs::new().arg(1).arg_seq(Vec::<i64>::new()),
            MismatchPolicy::Truncate,
        )
        .unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_strict_policy_rejects_mismatch() {
        let err = jobs_for(
            CallArgs::new().arg_seq([1, 2]).kwarg_seq("b", [1, 2, 3]),
            MismatchPolicy::Strict,
        )
        .unwrap_err();
        assert_eq!(
            err,
            HarnessError::LengthMismatch {
                lengths: vec![("arg0".to_string(), 2), ("b".to_string(), 3)]
            }
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: scalars mixed with one vector of length k give k jobs,
        /// each carrying the same scalars and the i-th element.
        #[test]
        fn one_vector_gives_one_job_per_element(
            scalars in prop::collection::vec(any::<i64>(), 0..4),
            vector in prop::collection::vec(any::<i64>(), 2..40),
        ) {
            let mut args = CallArgs::new();
            for s in &scalars {
                args = args.arg(*s);
            }
            let jobs = jobs_for(args.arg_seq(vector.clone()), MismatchPolicy::Strict).unwrap();

            prop_assert_eq!(jobs.len(), vector.len());
            for (i, job) in jobs.iter().enumerate() {
                prop_assert_eq!(&job.args[..scalars.len()], &scalars[..]);
                prop_assert_eq!(job.args[scalars.len()], vector[i]);
            }
        }

        /// Property: two vectors of lengths k1 < k2 truncate to k1 jobs.
        #[test]
        fn mismatched_vectors_truncate_to_shortest(
            k1 in 2usize..30,
            extra in 1usize..30,
        ) {
            let k2 = k1 + extra;
            let a: Vec<i64> = (0..k1 as i64).collect();
            let b: Vec<i64> = (0..k2 as i64).map(|v| v * 2).collect();

            let jobs = jobs_for(CallArgs::new().arg_seq(a).kwarg_seq("b", b), MismatchPolicy::Truncate).unwrap();

            prop_assert_eq!(jobs.len(), k1);
            let last = jobs.last().unwrap();
            prop_assert_eq!(last.kwarg("b"), Some(&((k1 as i64 - 1) * 2)));
        }
    }
}
