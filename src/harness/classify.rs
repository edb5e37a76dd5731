//! Scalar/vector classification of call arguments.
//!
//! Each argument handed to [`ThreadHeavy`](super::ThreadHeavy) is either a
//! [`Arg::Scalar`], applied unchanged to every job, or an [`Arg::Vector`],
//! whose i-th element goes to job i. The rule is structural: a value that
//! can be enumerated more than once and has a length other than 1 is a
//! vector, everything else is a scalar.
//!
//! What counts as "enumerable" for a single value is decided by a pluggable
//! [`Classifier`]. Sequences passed explicitly ([`Input::Seq`]) are already
//! materialized; one-shot iterators ([`Input::Stream`]) are buffered once so
//! counting them does not consume what the jobs will need.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::HarnessError;
use super::jobs::CallSignature;

/// One classified argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg<T> {
    Scalar(T),
    Vector(Vec<T>),
}

impl<T> Arg<T> {
    /// Number of jobs this argument can feed. Scalars feed any number, and
    /// report 1.
    pub fn len(&self) -> usize {
        match self {
            Arg::Scalar(_) => 1,
            Arg::Vector(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Arg::Vector(_))
    }

    /// Length rule shared by every materialized sequence.
    fn from_items(mut items: Vec<T>) -> Self {
        if items.len() == 1 {
            if let Some(only) = items.pop() {
                return Arg::Scalar(only);
            }
        }
        Arg::Vector(items)
    }
}

/// A raw argument as supplied by the caller.
pub enum Input<T> {
    /// A single value; its shape is decided by the [`Classifier`].
    Value(T),
    /// An already materialized sequence.
    Seq(Vec<T>),
    /// A one-shot iterator. Buffered before counting; must be finite.
    Stream(Box<dyn Iterator<Item = T> + Send>),
}

impl<T: fmt::Debug> fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Input::Seq(items) => f.debug_tuple("Seq").field(items).finish(),
            Input::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Decides whether a single value is a scalar or a vector.
pub trait Classifier<T>: Send + Sync {
    fn classify(&self, value: T) -> Arg<T>;
}

/// Treats every single value as a scalar. The default for typed Rust values;
/// pass vectors through [`CallArgs::arg_seq`] instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct Opaque;

impl<T> Classifier<T> for Opaque {
    fn classify(&self, value: T) -> Arg<T> {
        Arg::Scalar(value)
    }
}

/// How a JSON string is classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringPolicy {
    /// Strings are single values regardless of length.
    #[default]
    Scalar,
    /// Strings are sequences of characters: one job per character.
    Chars,
}

/// How a JSON object is classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectPolicy {
    /// Objects are single values, typically a record handed to every job.
    #[default]
    Scalar,
    /// Objects are sequences of their keys: one job per key, and `{}`
    /// yields no jobs. A one-key object stays a scalar object.
    Keys,
}

/// Structural classifier for [`serde_json::Value`] arguments.
///
/// Arrays with a length other than 1 are vectors of their elements. A
/// one-element array stays a scalar *array*, it is not unwrapped. Numbers,
/// booleans and null are scalars. Strings follow [`StringPolicy`] and
/// objects follow [`ObjectPolicy`]; both default to scalar, so text and
/// records are never split into jobs unless asked for.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonClassifier {
    pub strings: StringPolicy,
    pub objects: ObjectPolicy,
}

impl JsonClassifier {
    /// A classifier with the given string policy and scalar objects.
    pub fn with_strings(strings: StringPolicy) -> Self {
        Self {
            strings,
            ..Self::default()
        }
    }

    /// Replace the object policy.
    pub fn objects(mut self, objects: ObjectPolicy) -> Self {
        self.objects = objects;
        self
    }
}

impl Classifier<Value> for JsonClassifier {
    fn classify(&self, value: Value) -> Arg<Value> {
        match value {
            Value::Array(items) if items.len() != 1 => Arg::Vector(items),
            Value::String(s) if self.strings == StringPolicy::Chars && s.chars().count() != 1 => {
                Arg::Vector(s.chars().map(|c| Value::String(c.to_string())).collect())
            }
            Value::Object(map) if self.objects == ObjectPolicy::Keys && map.len() != 1 => {
                Arg::Vector(map.into_iter().map(|(key, _)| Value::String(key)).collect())
            }
            other => Arg::Scalar(other),
        }
    }
}

/// Classify one argument: `(kind, materialized value, length)` folded into
/// an [`Arg`], whose [`Arg::len`] is the length.
///
/// `name` is only used in error messages.
pub fn classify_input<T, C>(
    name: &str,
    input: Input<T>,
    classifier: &C,
    max_buffered: usize,
) -> Result<Arg<T>, HarnessError>
where
    C: Classifier<T> + ?Sized,
{
    match input {
        Input::Value(value) => Ok(classifier.classify(value)),
        Input::Seq(items) => Ok(Arg::from_items(items)),
        Input::Stream(iter) => {
            let buffered: Vec<T> = iter.take(max_buffered.saturating_add(1)).collect();
            if buffered.len() > max_buffered {
                return Err(HarnessError::ClassificationAmbiguity {
                    argument: name.to_string(),
                    reason: format!(
                        "one-shot sequence did not end within {max_buffered} items; \
                         pass a finite, materialized sequence"
                    ),
                });
            }
            Ok(Arg::from_items(buffered))
        }
    }
}

/// Positional and keyword arguments of one call, before classification.
///
/// ```ignore
/// let args = CallArgs::new()
///     .arg(lang)                 // scalar
///     .arg_seq(urls)             // one job per url
///     .kwarg("area", area);      // scalar keyword
/// ```
#[derive(Debug)]
pub struct CallArgs<T> {
    positional: Vec<Input<T>>,
    keyword: Vec<(String, Input<T>)>,
}

impl<T> Default for CallArgs<T> {
    fn default() -> Self {
        Self {
            positional: Vec::new(),
            keyword: Vec::new(),
        }
    }
}

impl<T> CallArgs<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, input: Input<T>) -> Self {
        self.positional.push(input);
        self
    }

    pub fn arg(self, value: T) -> Self {
        self.push(Input::Value(value))
    }

    pub fn arg_seq(self, values: impl IntoIterator<Item = T>) -> Self {
        self.push(Input::Seq(values.into_iter().collect()))
    }

    pub fn arg_stream(self, values: impl Iterator<Item = T> + Send + 'static) -> Self {
        self.push(Input::Stream(Box::new(values)))
    }

    /// Add a keyword argument. A repeated name replaces the earlier value.
    pub fn push_kw(mut self, name: impl Into<String>, input: Input<T>) -> Self {
        let name = name.into();
        match self.keyword.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = input,
            None => self.keyword.push((name, input)),
        }
        self
    }

    pub fn kwarg(self, name: impl Into<String>, value: T) -> Self {
        self.push_kw(name, Input::Value(value))
    }

    pub fn kwarg_seq(self, name: impl Into<String>, values: impl IntoIterator<Item = T>) -> Self {
        self.push_kw(name, Input::Seq(values.into_iter().collect()))
    }

    pub fn kwarg_stream(
        self,
        name: impl Into<String>,
        values: impl Iterator<Item = T> + Send + 'static,
    ) -> Self {
        self.push_kw(name, Input::Stream(Box::new(values)))
    }

    /// Classify every argument, keeping positional order and keyword
    /// insertion order.
    pub fn classify<C>(self, classifier: &C, max_buffered: usize) -> Result<CallSignature<T>, HarnessError>
    where
        C: Classifier<T> + ?Sized,
    {
        let positional = self
            .positional
            .into_iter()
            .enumerate()
            .map(|(i, input)| classify_input(&format!("arg{i}"), input, classifier, max_buffered))
            .collect::<Result<Vec<_>, _>>()?;
        let keyword = self
            .keyword
            .into_iter()
            .map(|(name, input)| {
                let arg = classify_input(&name, input, classifier, max_buffered)?;
                Ok((name, arg))
            })
            .collect::<Result<Vec<_>, HarnessError>>()?;
        Ok(CallSignature::new(positional, keyword))
    }
}
