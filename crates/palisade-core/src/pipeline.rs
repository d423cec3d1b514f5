//! The safety pipeline: one ordered decision over all guardrail checks.
//!
//! Checks run in a fixed order — blocked subject, high-risk subject, rate
//! limit, content filter, injection detector — stopping at the first
//! failure. Policy rejections are normal return values; only construction
//! can error. A check that faults internally is treated as "did not run":
//! the fault is attached to the verdict as a warning and the remaining
//! checks still execute.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::{ContentFilter, FilterLevel, FilterVerdict};
use crate::injection::{InjectionDetector, InjectionVerdict};
use crate::quota::{RateLimiter, RateLimitVerdict};
use crate::risk::{RiskLevel, RiskMonitor};

/// Which check rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The subject is explicitly or automatically blocked.
    UserBlocked,
    /// The subject's risk level is High or Critical.
    HighRiskUser,
    /// A rate or cost limit was exceeded.
    RateLimited,
    /// The content filter blocked the input.
    ContentBlocked,
    /// An injection attempt was detected.
    InjectionDetected,
}

impl FailureCategory {
    /// Returns the category as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::UserBlocked => "user_blocked",
            FailureCategory::HighRiskUser => "high_risk_user",
            FailureCategory::RateLimited => "rate_limited",
            FailureCategory::ContentBlocked => "content_blocked",
            FailureCategory::InjectionDetected => "injection_detected",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Combined result of all safety checks for one request.
///
/// The recommendation booleans tell the caller what enforcement the
/// pipeline suggests; the caller decides the actual action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyVerdict {
    /// Whether every check passed.
    pub passed: bool,
    /// The failing check, when not passed.
    pub failure_category: Option<FailureCategory>,
    /// Human-readable reason for the decision.
    pub message: String,
    /// Recommend refusing this request outright.
    pub should_block: bool,
    /// Recommend proceeding with a warning.
    pub should_warn: bool,
    /// Recommend applying rate-limit backoff.
    pub should_rate_limit: bool,
    /// Recommend escalating to a human operator.
    pub should_escalate: bool,
    /// The subject's risk level, when the profile check ran.
    pub risk_level: Option<RiskLevel>,
    /// Content-filter verdict, when it matched something or rejected.
    pub content: Option<FilterVerdict>,
    /// Injection verdict, when it matched something or rejected.
    pub injection: Option<InjectionVerdict>,
    /// Rate-limit verdict, when the check ran.
    pub rate_limit: Option<RateLimitVerdict>,
    /// Non-blocking notes: warn-level matches and checks that did not run.
    pub warnings: Vec<String>,
}

impl SafetyVerdict {
    fn rejected(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            passed: false,
            failure_category: Some(category),
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Pipeline toggles; every enforcement is independently switchable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Reject on content-filter block levels.
    pub block_on_content_violation: bool,
    /// Reject on injection detection.
    pub block_on_injection: bool,
    /// Reject when the rate limiter rejects.
    pub block_on_rate_limit: bool,
    /// Reject subjects at High or Critical risk.
    pub block_high_risk_users: bool,
    /// Emit a debug log line for every passed check.
    pub log_all_checks: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_on_content_violation: true,
            block_on_injection: true,
            block_on_rate_limit: true,
            block_high_risk_users: true,
            log_all_checks: false,
        }
    }
}

/// Pipeline decision counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Evaluations performed.
    pub total_checks: u64,
    /// Evaluations that passed every check.
    pub passed: u64,
    /// Rejections by the content filter.
    pub blocked_content: u64,
    /// Rejections by the injection detector.
    pub blocked_injection: u64,
    /// Rejections by the rate limiter.
    pub blocked_rate_limit: u64,
    /// Rejections of high-risk subjects.
    pub blocked_high_risk: u64,
}

/// Aggregated counters across the pipeline and its components.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GuardrailStats {
    /// Pipeline decision counters.
    pub pipeline: PipelineStats,
    /// Content-filter counters.
    pub content_filter: crate::filter::FilterStats,
    /// Lifetime injection detections.
    pub injection_detections: u64,
}

/// Runs every guardrail check over a request and produces one verdict.
///
/// Components are constructor-injected; there is no ambient state, so each
/// test or embedding gets an independent instance. The pipeline is
/// `Send + Sync` and is usually shared behind an `Arc`.
///
/// # Example
///
/// ```
/// use palisade_core::pipeline::SafetyPipeline;
///
/// # tokio_test::block_on(async {
/// let pipeline = SafetyPipeline::new();
/// let verdict = pipeline.evaluate("user123", "What is Rust?", 100).await;
/// assert!(verdict.passed);
/// # });
/// ```
pub struct SafetyPipeline {
    config: PipelineConfig,
    filter: Arc<ContentFilter>,
    detector: Arc<InjectionDetector>,
    limiter: Arc<RateLimiter>,
    monitor: Arc<RiskMonitor>,
    stats: Mutex<PipelineStats>,
}

impl SafetyPipeline {
    /// Creates a pipeline with default components and configuration.
    pub fn new() -> Self {
        Self::with_components(
            Arc::new(ContentFilter::new()),
            Arc::new(InjectionDetector::new()),
            Arc::new(RateLimiter::new()),
            Arc::new(RiskMonitor::new()),
            PipelineConfig::default(),
        )
    }

    /// Creates a pipeline from explicit components.
    pub fn with_components(
        filter: Arc<ContentFilter>,
        detector: Arc<InjectionDetector>,
        limiter: Arc<RateLimiter>,
        monitor: Arc<RiskMonitor>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            config,
            filter,
            detector,
            limiter,
            monitor,
            stats: Mutex::new(PipelineStats::default()),
        }
    }

    /// Evaluates a request against every check.
    pub async fn evaluate(
        &self,
        subject_id: &str,
        content: &str,
        estimated_cost: u64,
    ) -> SafetyVerdict {
        self.evaluate_at(subject_id, content, estimated_cost, Utc::now())
    }

    /// Evaluates a request at the given instant.
    pub fn evaluate_at(
        &self,
        subject_id: &str,
        content: &str,
        estimated_cost: u64,
        now: DateTime<Utc>,
    ) -> SafetyVerdict {
        self.bump(|stats| stats.total_checks += 1);

        let mut warnings: Vec<String> = Vec::new();
        let mut risk_level: Option<RiskLevel> = None;

        // Subject standing first: a blocked subject short-circuits everything.
        match self.monitor.profile_at(subject_id, now) {
            Ok(profile) => {
                risk_level = Some(profile.level);

                if profile.level == RiskLevel::Blocked {
                    let mut verdict =
                        SafetyVerdict::rejected(FailureCategory::UserBlocked, "User is blocked");
                    verdict.should_block = true;
                    verdict.risk_level = risk_level;
                    verdict.warnings = warnings;
                    return verdict;
                }

                if self.config.block_high_risk_users && profile.level >= RiskLevel::High {
                    self.bump(|stats| stats.blocked_high_risk += 1);
                    let mut verdict = SafetyVerdict::rejected(
                        FailureCategory::HighRiskUser,
                        format!("User risk level too high: {}", profile.level),
                    );
                    verdict.should_block = true;
                    verdict.should_escalate = true;
                    verdict.risk_level = risk_level;
                    verdict.warnings = warnings;
                    return verdict;
                }
            }
            Err(fault) => {
                tracing::warn!(subject_id, %fault, "risk profile check did not run");
                warnings.push(format!("risk profile check did not run: {fault}"));
            }
        }

        // Rate limit.
        let mut rate_verdict: Option<RateLimitVerdict> = None;
        match self.limiter.check_at(subject_id, estimated_cost, now) {
            Ok(checked) => {
                if !checked.allowed && self.config.block_on_rate_limit {
                    self.bump(|stats| stats.blocked_rate_limit += 1);
                    let mut verdict = SafetyVerdict::rejected(
                        FailureCategory::RateLimited,
                        checked.reason.clone(),
                    );
                    verdict.should_rate_limit = true;
                    verdict.risk_level = risk_level;
                    verdict.rate_limit = Some(checked);
                    verdict.warnings = warnings;
                    return verdict;
                }
                if !checked.allowed {
                    warnings.push(format!("rate limit exceeded (not enforced): {}", checked.reason));
                }
                rate_verdict = Some(checked);
            }
            Err(fault) => {
                tracing::warn!(subject_id, %fault, "rate limit check did not run");
                warnings.push(format!("rate limit check did not run: {fault}"));
            }
        }

        // Content filter.
        let content_verdict = self.filter.check(content);
        if content_verdict.is_blocked() && self.config.block_on_content_violation {
            self.bump(|stats| stats.blocked_content += 1);
            if let Err(fault) = self.monitor.record_request_at(
                subject_id,
                true,
                &content_verdict.message,
                0,
                now,
            ) {
                warnings.push(format!("violation recording did not run: {fault}"));
            }

            let mut verdict = SafetyVerdict::rejected(
                FailureCategory::ContentBlocked,
                content_verdict.message.clone(),
            );
            verdict.should_block = content_verdict.is_hard_blocked();
            verdict.should_warn = !content_verdict.is_hard_blocked();
            verdict.risk_level = risk_level;
            verdict.content = Some(content_verdict);
            verdict.warnings = warnings;
            return verdict;
        }
        if content_verdict.is_blocked() {
            warnings.push(format!("content block (not enforced): {}", content_verdict.message));
        } else if content_verdict.level == FilterLevel::Warn {
            warnings.push(content_verdict.message.clone());
        }

        // Injection detection.
        let injection_verdict = self.detector.detect(content);
        if injection_verdict.is_injection && self.config.block_on_injection {
            self.bump(|stats| stats.blocked_injection += 1);
            let injection_type = injection_verdict
                .injection_type
                .map(|ty| ty.as_str())
                .unwrap_or_default();
            let sample: String = content.chars().take(200).collect();
            if let Err(fault) =
                self.monitor
                    .record_injection_attempt_at(subject_id, injection_type, &sample, now)
            {
                warnings.push(format!("injection recording did not run: {fault}"));
            }

            let mut verdict = SafetyVerdict::rejected(
                FailureCategory::InjectionDetected,
                format!("Injection detected: {}", injection_verdict.explanation),
            );
            verdict.should_block = true;
            verdict.risk_level = risk_level;
            verdict.injection = Some(injection_verdict);
            verdict.warnings = warnings;
            return verdict;
        }

        // All checks passed; the success event updates counters, not risk.
        self.bump(|stats| stats.passed += 1);
        if let Err(fault) =
            self.monitor
                .record_request_at(subject_id, false, "", estimated_cost, now)
        {
            warnings.push(format!("request recording did not run: {fault}"));
        }
        if self.config.log_all_checks {
            tracing::debug!(subject_id, "safety checks passed");
        }

        SafetyVerdict {
            passed: true,
            risk_level,
            content: content_verdict.has_matches().then_some(content_verdict),
            injection: (!injection_verdict.matched_pattern.is_empty())
                .then_some(injection_verdict),
            rate_limit: rate_verdict,
            warnings,
            ..SafetyVerdict::default()
        }
    }

    /// Returns aggregated counters without mutating any state.
    pub fn stats(&self) -> GuardrailStats {
        GuardrailStats {
            pipeline: self.stats.lock().map(|s| *s).unwrap_or_default(),
            content_filter: self.filter.stats(),
            injection_detections: self.detector.detection_count(),
        }
    }

    /// The content filter used by this pipeline.
    pub fn filter(&self) -> &Arc<ContentFilter> {
        &self.filter
    }

    /// The injection detector used by this pipeline.
    pub fn detector(&self) -> &Arc<InjectionDetector> {
        &self.detector
    }

    /// The rate limiter used by this pipeline.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The risk monitor used by this pipeline.
    pub fn monitor(&self) -> &Arc<RiskMonitor> {
        &self.monitor
    }

    fn bump(&self, op: impl FnOnce(&mut PipelineStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            op(&mut stats);
        }
    }
}

impl Default for SafetyPipeline {
    fn default() -> Self {
        Self::new()
    }
}
