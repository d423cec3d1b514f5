//! Palisade Core - Safety guardrails for AI agents.
//!
//! This crate provides the guardrail components that inspect agent traffic
//! before and after execution:
//!
//! - [`filter`]: multi-category content filtering with PII redaction
//! - [`injection`]: prompt-injection detection and input sanitization
//! - [`quota`]: per-subject rate limiting across minute/hour/day windows
//! - [`risk`]: decaying behavioral risk scores and subject blocking
//! - [`pipeline`]: the ordered check sequence producing one verdict
//!
//! Detection is deterministic pattern matching; nothing here calls a model.
//! All state is in-memory and per-process.

pub mod error;
pub mod filter;
pub mod injection;
pub mod pipeline;
pub mod quota;
pub mod risk;

pub use error::{ConfigError, StatePoisoned};
pub use filter::{ContentFilter, FilterConfig, FilterLevel, FilterVerdict};
pub use injection::{
    DetectorConfig, InjectionDetector, InjectionType, InjectionVerdict, PromptGuard,
};
pub use pipeline::{FailureCategory, PipelineConfig, SafetyPipeline, SafetyVerdict};
pub use quota::{RateLimitConfig, RateLimiter, RateLimitVerdict, UsageSnapshot};
pub use risk::{BehaviorFlag, RiskLevel, RiskMonitor, RiskProfile};
