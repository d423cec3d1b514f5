//! Per-subject rate limiting across minute, hour, and day windows.
//!
//! Tracks request counts and cost units separately, supports cooldowns, and
//! evicts idle subject state opportunistically. Capacity checks are
//! decoupled from usage recording so callers can check, perform
//! variable-cost work, then record the true cost.

mod window;

pub use window::{QuotaWindow, SubjectUsage, UsageSnapshot};

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, StatePoisoned};

/// Rate limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Request limit for the minute window (before burst).
    pub requests_per_minute: u64,
    /// Request limit for the hour window.
    pub requests_per_hour: u64,
    /// Request limit for the day window.
    pub requests_per_day: u64,
    /// Cost-unit limit for the minute window (before burst).
    pub cost_per_minute: u64,
    /// Cost-unit limit for the hour window.
    pub cost_per_hour: u64,
    /// Cost-unit limit for the day window.
    pub cost_per_day: u64,
    /// Multiplier applied to minute limits to absorb short bursts.
    pub burst_multiplier: f64,
    /// Default cooldown length in seconds.
    pub cooldown_seconds: u64,
    /// Seconds between opportunistic idle-state sweeps.
    pub cleanup_interval_seconds: u64,
    /// Idle time after which subject state may be evicted.
    pub idle_eviction_seconds: u64,
    /// Whether limits are applied at all.
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_hour: 1_000,
            requests_per_day: 10_000,
            cost_per_minute: 100_000,
            cost_per_hour: 1_000_000,
            cost_per_day: 10_000_000,
            burst_multiplier: 2.0,
            cooldown_seconds: 60,
            cleanup_interval_seconds: 300,
            idle_eviction_seconds: 86_400,
            enabled: true,
        }
    }
}

impl RateLimitConfig {
    /// Validates numeric ranges; called by the limiter constructor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("requests_per_minute", self.requests_per_minute),
            ("requests_per_hour", self.requests_per_hour),
            ("requests_per_day", self.requests_per_day),
            ("cost_per_minute", self.cost_per_minute),
            ("cost_per_hour", self.cost_per_hour),
            ("cost_per_day", self.cost_per_day),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(ConfigError::InvalidLimit {
                    name,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        if self.burst_multiplier < 1.0 {
            return Err(ConfigError::InvalidLimit {
                name: "burst_multiplier",
                reason: format!("must be >= 1.0 (got {})", self.burst_multiplier),
            });
        }
        Ok(())
    }

    fn minute_request_limit(&self) -> u64 {
        (self.requests_per_minute as f64 * self.burst_multiplier) as u64
    }

    fn minute_cost_limit(&self) -> u64 {
        (self.cost_per_minute as f64 * self.burst_multiplier) as u64
    }
}

/// Result of a rate-limit check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitVerdict {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Which limit rejected the request, when not allowed.
    pub reason: String,
    /// Seconds until the rejecting limit resets.
    pub retry_after_seconds: i64,
    /// Minimum request headroom across the checked windows.
    pub remaining_requests: u64,
    /// Minimum cost headroom across the checked windows.
    pub remaining_cost: u64,
    /// When the rejecting window or cooldown resets.
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitVerdict {
    fn rejected(
        reason: impl Into<String>,
        retry_after_seconds: i64,
        reset_at: DateTime<Utc>,
    ) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            retry_after_seconds,
            reset_at: Some(reset_at),
            ..Self::default()
        }
    }
}

struct LimiterInner {
    subjects: HashMap<String, SubjectUsage>,
    last_cleanup: Option<DateTime<Utc>>,
}

/// Sliding-window rate limiter with cost accounting.
///
/// All subject state lives behind a single mutex held only for in-memory
/// mutation; different subjects never block each other beyond that map
/// access.
///
/// # Example
///
/// ```
/// use palisade_core::quota::RateLimiter;
///
/// let limiter = RateLimiter::new();
/// let verdict = limiter.check("user123", 500).unwrap();
/// if verdict.allowed {
///     // ... perform the work ...
///     limiter.record("user123", 480).unwrap();
/// }
/// ```
pub struct RateLimiter {
    config: RateLimitConfig,
    inner: Mutex<LimiterInner>,
}

impl RateLimiter {
    /// Creates a limiter with default limits.
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
            .unwrap_or_else(|_| unreachable!("default config is valid"))
    }

    /// Creates a limiter from the given configuration.
    pub fn with_config(config: RateLimitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            inner: Mutex::new(LimiterInner {
                subjects: HashMap::new(),
                last_cleanup: None,
            }),
        })
    }

    /// Checks whether a request of `estimated_cost` may proceed now.
    pub fn check(&self, subject_id: &str, estimated_cost: u64) -> Result<RateLimitVerdict, StatePoisoned> {
        self.check_at(subject_id, estimated_cost, Utc::now())
    }

    /// Checks whether a request may proceed at the given instant.
    ///
    /// Never increments usage counts; it does roll expired windows, count
    /// rejections, and opportunistically sweep idle state.
    pub fn check_at(
        &self,
        subject_id: &str,
        estimated_cost: u64,
        now: DateTime<Utc>,
    ) -> Result<RateLimitVerdict, StatePoisoned> {
        if !self.config.enabled {
            return Ok(RateLimitVerdict {
                allowed: true,
                remaining_requests: u64::MAX,
                remaining_cost: u64::MAX,
                ..RateLimitVerdict::default()
            });
        }

        let mut inner = self.lock()?;

        match inner.last_cleanup {
            None => inner.last_cleanup = Some(now),
            Some(last)
                if now - last >= Duration::seconds(self.config.cleanup_interval_seconds as i64) =>
            {
                self.sweep_idle(&mut inner, now);
                inner.last_cleanup = Some(now);
            }
            Some(_) => {}
        }

        let usage = inner
            .subjects
            .entry(subject_id.to_string())
            .or_insert_with(|| SubjectUsage::new(now));

        if let Some(until) = usage.cooldown_until.filter(|until| now < *until) {
            usage.total_rejections += 1;
            return Ok(RateLimitVerdict::rejected(
                "In cooldown period",
                (until - now).num_seconds(),
                until,
            ));
        }

        usage.roll_windows(now);
        let verdict = self.check_limits(usage, estimated_cost, now);

        if !verdict.allowed {
            usage.total_rejections += 1;
            tracing::warn!(
                subject_id,
                reason = %verdict.reason,
                "rate limit exceeded"
            );
        }

        Ok(verdict)
    }

    /// Records a completed unit of work at its true cost.
    pub fn record(&self, subject_id: &str, actual_cost: u64) -> Result<(), StatePoisoned> {
        self.record_at(subject_id, actual_cost, Utc::now())
    }

    /// Records a completed unit of work at the given instant.
    ///
    /// Must be called exactly once per completed unit of work; increments
    /// unconditionally (limits are enforced by `check`, not here).
    pub fn record_at(
        &self,
        subject_id: &str,
        actual_cost: u64,
        now: DateTime<Utc>,
    ) -> Result<(), StatePoisoned> {
        if !self.config.enabled {
            return Ok(());
        }

        let mut inner = self.lock()?;
        let Some(usage) = inner.subjects.get_mut(subject_id) else {
            return Ok(());
        };

        usage.roll_windows(now);
        usage.minute.requests += 1;
        usage.hour.requests += 1;
        usage.day.requests += 1;
        usage.minute.cost += actual_cost;
        usage.hour.cost += actual_cost;
        usage.day.cost += actual_cost;
        usage.total_requests += 1;
        usage.total_cost += actual_cost;

        Ok(())
    }

    /// Puts a subject in cooldown for `seconds` (config default if `None`).
    pub fn set_cooldown(&self, subject_id: &str, seconds: Option<u64>) -> Result<(), StatePoisoned> {
        self.set_cooldown_at(subject_id, seconds, Utc::now())
    }

    /// Puts a subject in cooldown starting at the given instant.
    pub fn set_cooldown_at(
        &self,
        subject_id: &str,
        seconds: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<(), StatePoisoned> {
        let duration = seconds.unwrap_or(self.config.cooldown_seconds);
        let mut inner = self.lock()?;
        let usage = inner
            .subjects
            .entry(subject_id.to_string())
            .or_insert_with(|| SubjectUsage::new(now));
        usage.cooldown_until = Some(now + Duration::seconds(duration as i64));
        tracing::info!(subject_id, duration, "subject placed in cooldown");
        Ok(())
    }

    /// Returns the subject's current usage numbers.
    pub fn usage(&self, subject_id: &str) -> Result<UsageSnapshot, StatePoisoned> {
        self.usage_at(subject_id, Utc::now())
    }

    /// Returns the subject's usage numbers at the given instant.
    pub fn usage_at(
        &self,
        subject_id: &str,
        now: DateTime<Utc>,
    ) -> Result<UsageSnapshot, StatePoisoned> {
        let mut inner = self.lock()?;
        let Some(usage) = inner.subjects.get_mut(subject_id) else {
            return Ok(UsageSnapshot::default());
        };

        usage.roll_windows(now);
        Ok(UsageSnapshot {
            minute_requests: usage.minute.requests,
            hour_requests: usage.hour.requests,
            day_requests: usage.day.requests,
            minute_cost: usage.minute.cost,
            hour_cost: usage.hour.cost,
            day_cost: usage.day.cost,
            total_requests: usage.total_requests,
            total_cost: usage.total_cost,
            total_rejections: usage.total_rejections,
            in_cooldown: usage.in_cooldown(now),
        })
    }

    /// Number of subjects currently tracked.
    pub fn subject_count(&self) -> Result<usize, StatePoisoned> {
        Ok(self.lock()?.subjects.len())
    }

    fn check_limits(
        &self,
        usage: &SubjectUsage,
        estimated_cost: u64,
        now: DateTime<Utc>,
    ) -> RateLimitVerdict {
        let config = &self.config;

        // Fixed check order: requests minute/hour/day, then cost minute/hour.
        if usage.minute.requests >= config.minute_request_limit() {
            return RateLimitVerdict::rejected(
                "Requests per minute exceeded",
                usage.minute.seconds_until_reset(now),
                usage.minute.reset_at(),
            );
        }
        if usage.hour.requests >= config.requests_per_hour {
            return RateLimitVerdict::rejected(
                "Requests per hour exceeded",
                usage.hour.seconds_until_reset(now),
                usage.hour.reset_at(),
            );
        }
        if usage.day.requests >= config.requests_per_day {
            return RateLimitVerdict::rejected(
                "Requests per day exceeded",
                usage.day.seconds_until_reset(now),
                usage.day.reset_at(),
            );
        }
        if usage.minute.cost + estimated_cost > config.minute_cost_limit() {
            let mut verdict = RateLimitVerdict::rejected(
                "Cost per minute exceeded",
                usage.minute.seconds_until_reset(now),
                usage.minute.reset_at(),
            );
            verdict.remaining_cost = config.cost_per_minute.saturating_sub(usage.minute.cost);
            return verdict;
        }
        if usage.hour.cost + estimated_cost > config.cost_per_hour {
            let mut verdict = RateLimitVerdict::rejected(
                "Cost per hour exceeded",
                usage.hour.seconds_until_reset(now),
                usage.hour.reset_at(),
            );
            verdict.remaining_cost = config.cost_per_hour.saturating_sub(usage.hour.cost);
            return verdict;
        }

        RateLimitVerdict {
            allowed: true,
            remaining_requests: [
                config.requests_per_minute.saturating_sub(usage.minute.requests),
                config.requests_per_hour.saturating_sub(usage.hour.requests),
                config.requests_per_day.saturating_sub(usage.day.requests),
            ]
            .into_iter()
            .min()
            .unwrap_or(0),
            remaining_cost: [
                config.cost_per_minute.saturating_sub(usage.minute.cost),
                config.cost_per_hour.saturating_sub(usage.hour.cost),
            ]
            .into_iter()
            .min()
            .unwrap_or(0),
            ..RateLimitVerdict::default()
        }
    }

    fn sweep_idle(&self, inner: &mut LimiterInner, now: DateTime<Utc>) {
        let idle_seconds = self.config.idle_eviction_seconds as i64;
        let before = inner.subjects.len();
        inner.subjects.retain(|_, usage| {
            !(usage.day.is_stale(now, idle_seconds) && !usage.in_cooldown(now))
        });
        let evicted = before - inner.subjects.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted idle rate-limit state");
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LimiterInner>, StatePoisoned> {
        self.inner.lock().map_err(|_| StatePoisoned {
            component: "rate limiter",
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
