//! Palisade Hooks - Agent-runner lifecycle integration.
//!
//! Bridges an agent runner's request lifecycle to the safety pipeline: the
//! start hook extracts subject and content from the opaque request payload
//! and evaluates it; the end hook records the true cost of completed work.

mod extract;

pub use extract::{
    extract_content, extract_subject_id, ANONYMOUS_SUBJECT, CONTENT_KEYS, SUBJECT_KEYS,
};

use std::sync::Arc;

use serde_json::Value;

use palisade_core::pipeline::{SafetyPipeline, SafetyVerdict};

/// Safety hook wired into an agent runner's request lifecycle.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use palisade_core::pipeline::SafetyPipeline;
/// use palisade_hooks::SafetyHook;
///
/// # tokio_test::block_on(async {
/// let hook = SafetyHook::new(Arc::new(SafetyPipeline::new()));
/// let payload = serde_json::json!({ "user_id": "u1", "prompt": "hello" });
///
/// let verdict = hook.on_request_start(&payload).await;
/// assert!(verdict.passed);
/// // ... agent executes the request ...
/// hook.on_request_end("u1", 350).await;
/// # });
/// ```
pub struct SafetyHook {
    pipeline: Arc<SafetyPipeline>,
}

impl SafetyHook {
    /// Creates a hook around an existing pipeline.
    pub fn new(pipeline: Arc<SafetyPipeline>) -> Self {
        Self { pipeline }
    }

    /// The pipeline this hook evaluates against.
    pub fn pipeline(&self) -> &Arc<SafetyPipeline> {
        &self.pipeline
    }

    /// Called before work begins: extracts subject and content from the
    /// payload and runs every safety check.
    pub async fn on_request_start(&self, payload: &Value) -> SafetyVerdict {
        let subject_id = extract_subject_id(payload);
        let content = extract_content(payload);

        let verdict = self.pipeline.evaluate(&subject_id, &content, 0).await;
        if !verdict.passed {
            tracing::warn!(
                subject_id,
                category = verdict.failure_category.map(|c| c.as_str()),
                reason = %verdict.message,
                "safety check failed for request"
            );
        }
        verdict
    }

    /// Called after work completes, regardless of the verdict, to record
    /// the true cost against the subject's quota.
    pub async fn on_request_end(&self, subject_id: &str, actual_cost: u64) {
        if let Err(fault) = self.pipeline.limiter().record(subject_id, actual_cost) {
            tracing::warn!(subject_id, %fault, "usage recording did not run");
        }
    }
}
