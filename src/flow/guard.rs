//! Guard predicates gating flow edges.
//!
//! Guards are data, not callables: a small closed vocabulary of tagged
//! variants that serializes with the rest of the graph and evaluates
//! deterministically in tests. Evaluation is pure and total: a guard never
//! fails, and a missing key resolves to the variant's documented default.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{AnswerMap, MetadataMap};

/// A pure predicate deciding whether an edge may be taken.
///
/// Evaluated against the session's accumulated answers and metadata. The
/// vocabulary is closed: new kinds are added here (and only here), keeping
/// graphs serializable and navigation deterministic.
///
/// # Defaults for missing keys
///
/// - [`AnswerPresent`](Guard::AnswerPresent): a missing or `null` answer is
///   *not present* → `false`.
/// - [`AnswerEquals`](Guard::AnswerEquals): a missing answer equals nothing
///   → `false`.
/// - [`AnswersMissing`](Guard::AnswersMissing): a key that is absent or
///   `null` counts as missing → `true` if *any* listed key is missing; an
///   empty key list has nothing missing → `false`.
/// - [`MetadataEquals`](Guard::MetadataEquals): missing metadata equals
///   nothing → `false`.
///
/// # Examples
///
/// ```rust
/// use colloquy::flow::Guard;
/// use colloquy::types::{AnswerMap, MetadataMap};
/// use serde_json::json;
///
/// let mut answers = AnswerMap::default();
/// answers.insert("topic".into(), json!("billing"));
/// let metadata = MetadataMap::default();
///
/// assert!(Guard::Always.matches(&answers, &metadata));
/// assert!(Guard::answer_equals("topic", json!("billing")).matches(&answers, &metadata));
/// assert!(!Guard::answer_present("name").matches(&answers, &metadata));
/// assert!(Guard::answers_missing(["name"]).matches(&answers, &metadata));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Guard {
    /// Matches unconditionally. The usual final fallback edge.
    Always,
    /// Matches when `key` has a non-null answer.
    AnswerPresent { key: String },
    /// Matches when the answer under `key` equals `value` exactly.
    AnswerEquals { key: String, value: Value },
    /// Matches when *any* of `keys` is absent (or null) from the answers.
    /// Routes back to collection nodes while dependencies are unmet.
    AnswersMissing { keys: Vec<String> },
    /// Matches when the metadata under `key` equals `value` exactly.
    MetadataEquals { key: String, value: Value },
}

impl Guard {
    /// Shorthand for [`Guard::AnswerPresent`].
    #[must_use]
    pub fn answer_present(key: impl Into<String>) -> Self {
        Self::AnswerPresent { key: key.into() }
    }

    /// Shorthand for [`Guard::AnswerEquals`].
    #[must_use]
    pub fn answer_equals(key: impl Into<String>, value: Value) -> Self {
        Self::AnswerEquals {
            key: key.into(),
            value,
        }
    }

    /// Shorthand for [`Guard::AnswersMissing`].
    #[must_use]
    pub fn answers_missing<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnswersMissing {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Shorthand for [`Guard::MetadataEquals`].
    #[must_use]
    pub fn metadata_equals(key: impl Into<String>, value: Value) -> Self {
        Self::MetadataEquals {
            key: key.into(),
            value,
        }
    }

    /// Evaluates this guard. Pure and total: same inputs, same verdict,
    /// never an error.
    #[must_use]
    pub fn matches(&self, answers: &AnswerMap, metadata: &MetadataMap) -> bool {
        match self {
            Guard::Always => true,
            Guard::AnswerPresent { key } => is_present(answers.get(key)),
            Guard::AnswerEquals { key, value } => answers.get(key) == Some(value),
            Guard::AnswersMissing { keys } => {
                keys.iter().any(|key| !is_present(answers.get(key)))
            }
            Guard::MetadataEquals { key, value } => metadata.get(key) == Some(value),
        }
    }
}

fn is_present(value: Option<&Value>) -> bool {
    matches!(value, Some(v) if !v.is_null())
}
