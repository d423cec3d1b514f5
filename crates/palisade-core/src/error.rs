//! Error types shared across guardrail components.

use thiserror::Error;

/// Errors raised while constructing guardrail components.
///
/// Configuration problems fail fast at construction; request-time policy
/// rejections are never errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A caller-supplied pattern failed to compile.
    #[error("invalid custom pattern for category '{category}': {source}")]
    InvalidPattern {
        /// Category the pattern was registered under.
        category: String,
        /// Underlying regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// A numeric limit is outside its valid range.
    #[error("invalid limit '{name}': {reason}")]
    InvalidLimit {
        /// Name of the offending configuration field.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Risk thresholds are not strictly ascending.
    #[error("risk thresholds must satisfy medium < high < critical < auto-block (got {medium}, {high}, {critical}, {auto_block})")]
    InvalidThresholds {
        /// Medium risk threshold.
        medium: f64,
        /// High risk threshold.
        high: f64,
        /// Critical risk threshold.
        critical: f64,
        /// Auto-block threshold.
        auto_block: f64,
    },
}

/// A guardrail component's subject state was poisoned by a panicking writer.
///
/// Surfaced to the pipeline, which treats the affected check as "did not
/// run" rather than failing the whole evaluation.
#[derive(Debug, Error)]
#[error("{component} state is unavailable (poisoned lock)")]
pub struct StatePoisoned {
    /// Component whose state could not be locked.
    pub component: &'static str,
}
