//! Subject behavior monitoring and risk scoring.
//!
//! Maintains a decaying risk score, behavioral flags, and a bounded event
//! history per subject, and classifies each subject into a risk level.
//! Scores decay lazily on every read and write; there is no background
//! timer.

mod profile;

pub use profile::{BehaviorEvent, BehaviorFlag, EventKind, RiskLevel, RiskProfile};

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, StatePoisoned};

/// Risk monitor configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Score points shed per hour of inactivity.
    pub decay_rate_per_hour: f64,
    /// Score at or above which a subject is auto-blocked.
    pub auto_block_threshold: f64,
    /// Score at or above which risk is Medium.
    pub medium_threshold: f64,
    /// Score at or above which risk is High.
    pub high_threshold: f64,
    /// Score at or above which risk is Critical.
    pub critical_threshold: f64,
    /// Trailing window for rapid-fire detection, in seconds.
    pub rapid_fire_window_seconds: i64,
    /// Event count above which the window counts as rapid fire.
    pub rapid_fire_event_threshold: usize,
    /// Capacity of the per-subject event ring.
    pub event_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            decay_rate_per_hour: 0.1,
            auto_block_threshold: 100.0,
            medium_threshold: 25.0,
            high_threshold: 50.0,
            critical_threshold: 75.0,
            rapid_fire_window_seconds: 60,
            rapid_fire_event_threshold: 30,
            event_capacity: 100,
        }
    }
}

impl MonitorConfig {
    /// Validates threshold ordering and ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decay_rate_per_hour < 0.0 {
            return Err(ConfigError::InvalidLimit {
                name: "decay_rate_per_hour",
                reason: format!("must be >= 0 (got {})", self.decay_rate_per_hour),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidLimit {
                name: "event_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        let ascending = self.medium_threshold < self.high_threshold
            && self.high_threshold < self.critical_threshold
            && self.critical_threshold < self.auto_block_threshold;
        if !ascending {
            return Err(ConfigError::InvalidThresholds {
                medium: self.medium_threshold,
                high: self.high_threshold,
                critical: self.critical_threshold,
                auto_block: self.auto_block_threshold,
            });
        }
        Ok(())
    }
}

/// Monitor-wide statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorStats {
    /// Subjects tracked.
    pub total_subjects: usize,
    /// Subjects per risk level.
    pub risk_distribution: RiskDistribution,
    /// Requests recorded across all subjects.
    pub total_requests: u64,
    /// Blocked requests recorded across all subjects.
    pub total_blocked: u64,
    /// Injection attempts recorded across all subjects.
    pub total_injections: u64,
    /// Blocked requests as a fraction of all requests.
    pub block_rate: f64,
}

/// Count of subjects at each risk level.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RiskDistribution {
    /// Subjects at Low.
    pub low: usize,
    /// Subjects at Medium.
    pub medium: usize,
    /// Subjects at High.
    pub high: usize,
    /// Subjects at Critical.
    pub critical: usize,
    /// Subjects at Blocked.
    pub blocked: usize,
}

/// Monitors subject behavior and maintains risk profiles.
///
/// Profiles are created on first reference and live for the process
/// lifetime. The subject map sits behind one mutex held only for in-memory
/// mutation.
///
/// # Example
///
/// ```
/// use palisade_core::risk::{RiskLevel, RiskMonitor};
///
/// let monitor = RiskMonitor::new();
/// monitor.record_injection_attempt("user123", "jailbreak", "ignore the rules").unwrap();
/// let profile = monitor.profile("user123").unwrap();
/// assert!(profile.score > 0.0);
/// ```
pub struct RiskMonitor {
    config: MonitorConfig,
    profiles: Mutex<HashMap<String, RiskProfile>>,
}

impl RiskMonitor {
    /// Creates a monitor with default thresholds.
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::default())
            .unwrap_or_else(|_| unreachable!("default config is valid"))
    }

    /// Creates a monitor from the given configuration.
    pub fn with_config(config: MonitorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            profiles: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the subject's profile, creating it if absent.
    pub fn profile(&self, subject_id: &str) -> Result<RiskProfile, StatePoisoned> {
        self.profile_at(subject_id, Utc::now())
    }

    /// Returns the subject's profile as of the given instant.
    pub fn profile_at(
        &self,
        subject_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RiskProfile, StatePoisoned> {
        self.mutate(subject_id, now, |_profile, _config| {})
    }

    /// Records a request outcome for the subject.
    pub fn record_request(
        &self,
        subject_id: &str,
        was_blocked: bool,
        block_reason: &str,
        cost: u64,
    ) -> Result<RiskProfile, StatePoisoned> {
        self.record_request_at(subject_id, was_blocked, block_reason, cost, Utc::now())
    }

    /// Records a request outcome at the given instant.
    pub fn record_request_at(
        &self,
        subject_id: &str,
        was_blocked: bool,
        block_reason: &str,
        cost: u64,
        now: DateTime<Utc>,
    ) -> Result<RiskProfile, StatePoisoned> {
        self.mutate(subject_id, now, |profile, config| {
            profile.total_requests += 1;
            profile.last_seen = now;

            if was_blocked {
                profile.blocked_requests += 1;
                profile.filter_violations += 1;
                profile.add_event(
                    EventKind::BlockedContent,
                    serde_json::json!({ "reason": block_reason }),
                    now,
                    config.event_capacity,
                );
                profile.score += f64::from(EventKind::BlockedContent.severity());

                if profile.blocked_requests >= 3 {
                    profile.add_flag(BehaviorFlag::RepeatedBlockedContent);
                }
            } else {
                profile.add_event(
                    EventKind::Request,
                    serde_json::json!({ "cost": cost }),
                    now,
                    config.event_capacity,
                );
            }

            // The flag is added once; the penalty recurs per occurrence.
            let recent = profile.recent_event_count(config.rapid_fire_window_seconds, now);
            if recent > config.rapid_fire_event_threshold {
                profile.add_flag(BehaviorFlag::RapidFireRequests);
                profile.add_event(
                    EventKind::RapidFire,
                    serde_json::json!({}),
                    now,
                    config.event_capacity,
                );
                profile.score += f64::from(EventKind::RapidFire.severity());
            }
        })
    }

    /// Records a prompt-injection attempt.
    pub fn record_injection_attempt(
        &self,
        subject_id: &str,
        injection_type: &str,
        content_sample: &str,
    ) -> Result<RiskProfile, StatePoisoned> {
        self.record_injection_attempt_at(subject_id, injection_type, content_sample, Utc::now())
    }

    /// Records a prompt-injection attempt at the given instant.
    pub fn record_injection_attempt_at(
        &self,
        subject_id: &str,
        injection_type: &str,
        content_sample: &str,
        now: DateTime<Utc>,
    ) -> Result<RiskProfile, StatePoisoned> {
        let sample: String = content_sample.chars().take(100).collect();
        let profile = self.mutate(subject_id, now, |profile, config| {
            profile.injection_attempts += 1;
            profile.add_event(
                EventKind::InjectionAttempt,
                serde_json::json!({ "type": injection_type, "sample": sample }),
                now,
                config.event_capacity,
            );
            profile.score += f64::from(EventKind::InjectionAttempt.severity());

            if profile.injection_attempts >= 2 {
                profile.add_flag(BehaviorFlag::PromptInjectionAttempts);
            }
        })?;

        tracing::warn!(
            subject_id,
            attempts = profile.injection_attempts,
            score = profile.score,
            "injection attempt recorded"
        );
        Ok(profile)
    }

    /// Records a filter-circumvention attempt.
    pub fn record_circumvention(
        &self,
        subject_id: &str,
        details: serde_json::Value,
    ) -> Result<RiskProfile, StatePoisoned> {
        self.record_circumvention_at(subject_id, details, Utc::now())
    }

    /// Records a filter-circumvention attempt at the given instant.
    pub fn record_circumvention_at(
        &self,
        subject_id: &str,
        details: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<RiskProfile, StatePoisoned> {
        let profile = self.mutate(subject_id, now, |profile, config| {
            profile.add_event(
                EventKind::FilterCircumvention,
                details.clone(),
                now,
                config.event_capacity,
            );
            profile.score += f64::from(EventKind::FilterCircumvention.severity());
            profile.add_flag(BehaviorFlag::FilterCircumvention);
        })?;

        tracing::warn!(subject_id, score = profile.score, "filter circumvention recorded");
        Ok(profile)
    }

    /// Adds a positive flag, lowering the subject's score.
    ///
    /// Non-positive flags are ignored; use the record operations for those.
    pub fn add_positive_flag(
        &self,
        subject_id: &str,
        flag: BehaviorFlag,
    ) -> Result<RiskProfile, StatePoisoned> {
        self.add_positive_flag_at(subject_id, flag, Utc::now())
    }

    /// Adds a positive flag at the given instant.
    pub fn add_positive_flag_at(
        &self,
        subject_id: &str,
        flag: BehaviorFlag,
        now: DateTime<Utc>,
    ) -> Result<RiskProfile, StatePoisoned> {
        self.mutate(subject_id, now, |profile, _config| {
            if flag.is_positive() && profile.add_flag(flag) {
                profile.score = (profile.score - 10.0).max(0.0);
            }
        })
    }

    /// Blocks a subject until explicitly unblocked.
    pub fn block(&self, subject_id: &str, reason: &str) -> Result<RiskProfile, StatePoisoned> {
        self.block_at(subject_id, reason, Utc::now())
    }

    /// Blocks a subject at the given instant.
    pub fn block_at(
        &self,
        subject_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<RiskProfile, StatePoisoned> {
        let profile = self.mutate(subject_id, now, |profile, config| {
            profile.level = RiskLevel::Blocked;
            profile.add_event(
                EventKind::Blocked,
                serde_json::json!({ "reason": reason }),
                now,
                config.event_capacity,
            );
        })?;

        tracing::warn!(subject_id, reason, "subject blocked");
        Ok(profile)
    }

    /// Unblocks a subject onto probation: level Medium, score at the Medium
    /// threshold. Never an amnesty back to Low.
    pub fn unblock(&self, subject_id: &str) -> Result<RiskProfile, StatePoisoned> {
        self.unblock_at(subject_id, Utc::now())
    }

    /// Unblocks a subject at the given instant.
    pub fn unblock_at(
        &self,
        subject_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RiskProfile, StatePoisoned> {
        let profile = self.mutate(subject_id, now, |profile, config| {
            profile.level = RiskLevel::Medium;
            profile.score = config.medium_threshold;
            profile.add_event(
                EventKind::Unblocked,
                serde_json::json!({}),
                now,
                config.event_capacity,
            );
        })?;

        tracing::info!(subject_id, "subject unblocked");
        Ok(profile)
    }

    /// Returns all High, Critical, and Blocked profiles, highest score first.
    pub fn high_risk_profiles(&self) -> Result<Vec<RiskProfile>, StatePoisoned> {
        self.high_risk_profiles_at(Utc::now())
    }

    /// Returns high-risk profiles as of the given instant.
    pub fn high_risk_profiles_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RiskProfile>, StatePoisoned> {
        let mut profiles = self.lock()?;
        let mut high_risk: Vec<RiskProfile> = profiles
            .values_mut()
            .map(|profile| {
                Self::apply_decay(profile, &self.config, now);
                Self::update_level(profile, &self.config);
                profile.clone()
            })
            .filter(|profile| profile.level >= RiskLevel::High)
            .collect();

        high_risk.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(high_risk)
    }

    /// Returns monitor-wide statistics without changing any outcome.
    pub fn stats(&self) -> Result<MonitorStats, StatePoisoned> {
        self.stats_at(Utc::now())
    }

    /// Returns monitor-wide statistics as of the given instant.
    pub fn stats_at(&self, now: DateTime<Utc>) -> Result<MonitorStats, StatePoisoned> {
        let mut profiles = self.lock()?;
        let mut stats = MonitorStats {
            total_subjects: profiles.len(),
            ..MonitorStats::default()
        };

        for profile in profiles.values_mut() {
            Self::apply_decay(profile, &self.config, now);
            Self::update_level(profile, &self.config);
            match profile.level {
                RiskLevel::Low => stats.risk_distribution.low += 1,
                RiskLevel::Medium => stats.risk_distribution.medium += 1,
                RiskLevel::High => stats.risk_distribution.high += 1,
                RiskLevel::Critical => stats.risk_distribution.critical += 1,
                RiskLevel::Blocked => stats.risk_distribution.blocked += 1,
            }
            stats.total_requests += profile.total_requests;
            stats.total_blocked += profile.blocked_requests;
            stats.total_injections += profile.injection_attempts;
        }

        if stats.total_requests > 0 {
            stats.block_rate = stats.total_blocked as f64 / stats.total_requests as f64;
        }
        Ok(stats)
    }

    /// Locks the map, applies decay, runs the mutation, recomputes the
    /// level, and returns the resulting profile.
    fn mutate(
        &self,
        subject_id: &str,
        now: DateTime<Utc>,
        op: impl FnOnce(&mut RiskProfile, &MonitorConfig),
    ) -> Result<RiskProfile, StatePoisoned> {
        let mut profiles = self.lock()?;
        let profile = profiles
            .entry(subject_id.to_string())
            .or_insert_with(|| RiskProfile::new(subject_id, now));

        Self::apply_decay(profile, &self.config, now);
        op(profile, &self.config);
        Self::update_level(profile, &self.config);
        Ok(profile.clone())
    }

    /// Applies lazy linear decay up to `now`. Blocked profiles do not decay.
    fn apply_decay(profile: &mut RiskProfile, config: &MonitorConfig, now: DateTime<Utc>) {
        if profile.level == RiskLevel::Blocked {
            return;
        }
        let elapsed_seconds = (now - profile.decayed_at).num_seconds();
        if elapsed_seconds <= 0 {
            return;
        }
        let hours = elapsed_seconds as f64 / 3600.0;
        profile.score = (profile.score - hours * config.decay_rate_per_hour).max(0.0);
        profile.decayed_at = now;
    }

    /// Recomputes the level from the score. Blocked is sticky until an
    /// explicit unblock; crossing the auto-block threshold blocks.
    fn update_level(profile: &mut RiskProfile, config: &MonitorConfig) {
        if profile.level == RiskLevel::Blocked {
            return;
        }
        if profile.score >= config.auto_block_threshold {
            profile.level = RiskLevel::Blocked;
            tracing::warn!(
                subject_id = %profile.subject_id,
                score = profile.score,
                "subject auto-blocked"
            );
            return;
        }
        profile.level = if profile.score >= config.critical_threshold {
            RiskLevel::Critical
        } else if profile.score >= config.high_threshold {
            RiskLevel::High
        } else if profile.score >= config.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, RiskProfile>>, StatePoisoned> {
        self.profiles.lock().map_err(|_| StatePoisoned {
            component: "risk monitor",
        })
    }
}

impl Default for RiskMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn monitor() -> RiskMonitor {
        RiskMonitor::new()
    }

    // === Scoring Tests ===

    #[test]
    fn new_subject_starts_low() {
        let monitor = monitor();
        let profile = monitor.profile_at("u1", at(0)).unwrap();
        assert_eq!(profile.level, RiskLevel::Low);
        assert_eq!(profile.score, 0.0);
        assert_eq!(profile.first_seen, at(0));
    }

    #[test]
    fn blocked_requests_raise_score_and_flag_once() {
        let monitor = monitor();
        for _ in 0..5 {
            monitor
                .record_request_at("u1", true, "bad content", 0, at(0))
                .unwrap();
        }

        let profile = monitor.profile_at("u1", at(0)).unwrap();
        assert!(profile.level >= RiskLevel::Medium);
        assert_eq!(profile.score, 25.0);
        assert_eq!(
            profile
                .flags
                .iter()
                .filter(|f| **f == BehaviorFlag::RepeatedBlockedContent)
                .count(),
            1
        );
    }

    #[test]
    fn plain_requests_log_without_scoring() {
        let monitor = monitor();
        monitor.record_request_at("u1", false, "", 100, at(0)).unwrap();

        let profile = monitor.profile_at("u1", at(0)).unwrap();
        assert_eq!(profile.score, 0.0);
        assert_eq!(profile.total_requests, 1);
        assert_eq!(profile.recent_events.len(), 1);
    }

    #[test]
    fn injection_attempts_flag_at_two() {
        let monitor = monitor();
        monitor
            .record_injection_attempt_at("u1", "jailbreak", "sample", at(0))
            .unwrap();
        let profile = monitor.profile_at("u1", at(0)).unwrap();
        assert!(!profile.flags.contains(&BehaviorFlag::PromptInjectionAttempts));

        monitor
            .record_injection_attempt_at("u1", "jailbreak", "sample", at(0))
            .unwrap();
        let profile = monitor.profile_at("u1", at(0)).unwrap();
        assert!(profile.flags.contains(&BehaviorFlag::PromptInjectionAttempts));
        assert_eq!(profile.score, 30.0);
    }

    #[test]
    fn injection_sample_is_truncated() {
        let monitor = monitor();
        let long_sample = "x".repeat(500);
        let profile = monitor
            .record_injection_attempt_at("u1", "jailbreak", &long_sample, at(0))
            .unwrap();
        let event = profile.recent_events.back().unwrap();
        let stored = event.details["sample"].as_str().unwrap();
        assert_eq!(stored.len(), 100);
    }

    #[test]
    fn circumvention_scores_twenty_and_flags() {
        let monitor = monitor();
        let profile = monitor
            .record_circumvention_at("u1", serde_json::json!({"via": "encoding"}), at(0))
            .unwrap();
        assert_eq!(profile.score, 20.0);
        assert!(profile.flags.contains(&BehaviorFlag::FilterCircumvention));
    }

    // === Decay Tests ===

    #[test]
    fn score_decays_while_idle() {
        let monitor = monitor();
        monitor
            .record_circumvention_at("u1", serde_json::json!({}), at(0))
            .unwrap();

        let fresh = monitor.profile_at("u1", at(0)).unwrap().score;
        let after_ten_hours = monitor.profile_at("u1", at(36_000)).unwrap().score;
        assert!((fresh - 20.0).abs() < 1e-9);
        assert!((after_ten_hours - 19.0).abs() < 1e-9);
    }

    #[test]
    fn repeated_reads_do_not_compound_decay() {
        let monitor = monitor();
        monitor
            .record_circumvention_at("u1", serde_json::json!({}), at(0))
            .unwrap();

        let first = monitor.profile_at("u1", at(36_000)).unwrap().score;
        let second = monitor.profile_at("u1", at(36_000)).unwrap().score;
        assert_eq!(first, second);
    }

    #[test]
    fn score_never_decays_below_zero() {
        let monitor = monitor();
        monitor.record_request_at("u1", true, "r", 0, at(0)).unwrap();

        // Far longer than 5 points / 0.1 per hour takes to reach zero.
        let profile = monitor.profile_at("u1", at(10_000_000)).unwrap();
        assert_eq!(profile.score, 0.0);
        assert_eq!(profile.level, RiskLevel::Low);
    }

    #[test]
    fn negative_events_raise_score_after_decay() {
        let monitor = monitor();
        monitor.record_request_at("u1", true, "r", 0, at(0)).unwrap();
        let before = monitor.profile_at("u1", at(3_600)).unwrap().score;
        let after = monitor
            .record_request_at("u1", true, "r", 0, at(3_600))
            .unwrap()
            .score;
        assert!(after > before);
    }

    // === Blocking Tests ===

    #[test]
    fn explicit_block_is_sticky() {
        let monitor = monitor();
        monitor.block_at("u1", "abuse", at(0)).unwrap();

        let profile = monitor.profile_at("u1", at(1)).unwrap();
        assert_eq!(profile.level, RiskLevel::Blocked);

        // Neither decay nor new events change a blocked subject's level.
        let profile = monitor.profile_at("u1", at(1_000_000)).unwrap();
        assert_eq!(profile.level, RiskLevel::Blocked);
        let profile = monitor
            .record_request_at("u1", false, "", 0, at(1_000_001))
            .unwrap();
        assert_eq!(profile.level, RiskLevel::Blocked);
    }

    #[test]
    fn score_crossing_threshold_auto_blocks() {
        let monitor = monitor();
        for _ in 0..5 {
            monitor
                .record_circumvention_at("u1", serde_json::json!({}), at(0))
                .unwrap();
        }
        let profile = monitor.profile_at("u1", at(0)).unwrap();
        assert_eq!(profile.level, RiskLevel::Blocked);
        assert!(profile.score >= 100.0);
    }

    #[test]
    fn unblock_resets_to_probation() {
        let monitor = monitor();
        monitor.block_at("u1", "abuse", at(0)).unwrap();
        let profile = monitor.unblock_at("u1", at(10)).unwrap();

        assert_eq!(profile.level, RiskLevel::Medium);
        assert_eq!(profile.score, 25.0);
    }

    #[test]
    fn blocked_score_does_not_decay() {
        let monitor = monitor();
        for _ in 0..5 {
            monitor
                .record_circumvention_at("u1", serde_json::json!({}), at(0))
                .unwrap();
        }

        // A year later the auto-blocked score is untouched.
        let profile = monitor.profile_at("u1", at(31_536_000)).unwrap();
        assert_eq!(profile.level, RiskLevel::Blocked);
        assert!(profile.score >= 100.0);
    }

    // === Rapid Fire Tests ===

    #[test]
    fn rapid_fire_flags_once_but_penalizes_repeatedly() {
        let monitor = monitor();
        for i in 0..33 {
            monitor
                .record_request_at("u1", false, "", 0, at(i))
                .unwrap();
        }

        let profile = monitor.profile_at("u1", at(33)).unwrap();
        assert_eq!(
            profile
                .flags
                .iter()
                .filter(|f| **f == BehaviorFlag::RapidFireRequests)
                .count(),
            1
        );
        // Requests 31..33 each exceeded the 30-event window.
        assert!(profile.score >= 10.0);
    }

    #[test]
    fn slow_traffic_never_trips_rapid_fire() {
        let monitor = monitor();
        for i in 0..40 {
            monitor
                .record_request_at("u1", false, "", 0, at(i * 10))
                .unwrap();
        }
        let profile = monitor.profile_at("u1", at(400)).unwrap();
        assert!(!profile.flags.contains(&BehaviorFlag::RapidFireRequests));
    }

    // === Positive Flag Tests ===

    #[test]
    fn positive_flag_reduces_score() {
        let monitor = monitor();
        monitor
            .record_circumvention_at("u1", serde_json::json!({}), at(0))
            .unwrap();
        let profile = monitor
            .add_positive_flag_at("u1", BehaviorFlag::VerifiedUser, at(0))
            .unwrap();
        assert_eq!(profile.score, 10.0);
        assert!(profile.flags.contains(&BehaviorFlag::VerifiedUser));
    }

    #[test]
    fn negative_flags_are_rejected_by_positive_path() {
        let monitor = monitor();
        let profile = monitor
            .add_positive_flag_at("u1", BehaviorFlag::FilterCircumvention, at(0))
            .unwrap();
        assert!(profile.flags.is_empty());
        assert_eq!(profile.score, 0.0);
    }

    #[test]
    fn positive_flag_applies_once() {
        let monitor = monitor();
        monitor
            .record_circumvention_at("u1", serde_json::json!({}), at(0))
            .unwrap();
        monitor
            .add_positive_flag_at("u1", BehaviorFlag::VerifiedUser, at(0))
            .unwrap();
        let profile = monitor
            .add_positive_flag_at("u1", BehaviorFlag::VerifiedUser, at(0))
            .unwrap();
        assert_eq!(profile.score, 10.0);
    }

    // === Listing / Stats Tests ===

    #[test]
    fn high_risk_listing_sorts_by_score() {
        let monitor = monitor();
        for _ in 0..3 {
            monitor
                .record_circumvention_at("high", serde_json::json!({}), at(0))
                .unwrap();
        }
        for _ in 0..4 {
            monitor
                .record_circumvention_at("critical", serde_json::json!({}), at(0))
                .unwrap();
        }
        monitor
            .record_circumvention_at("medium", serde_json::json!({}), at(0))
            .unwrap();
        monitor
            .record_injection_attempt_at("medium", "jailbreak", "", at(0))
            .unwrap();
        monitor.record_request_at("fine", false, "", 0, at(0)).unwrap();

        let high_risk = monitor.high_risk_profiles_at(at(0)).unwrap();
        let ids: Vec<_> = high_risk.iter().map(|p| p.subject_id.as_str()).collect();
        assert_eq!(ids, vec!["critical", "high"]);

        // 35 points stays below the High threshold.
        let profile = monitor.profile_at("medium", at(0)).unwrap();
        assert_eq!(profile.level, RiskLevel::Medium);
    }

    #[test]
    fn stats_aggregate_all_subjects() {
        let monitor = monitor();
        monitor.record_request_at("a", false, "", 0, at(0)).unwrap();
        monitor.record_request_at("a", true, "bad", 0, at(1)).unwrap();
        monitor.record_request_at("b", false, "", 0, at(2)).unwrap();
        monitor
            .record_injection_attempt_at("b", "jailbreak", "", at(3))
            .unwrap();

        let stats = monitor.stats_at(at(10)).unwrap();
        assert_eq!(stats.total_subjects, 2);
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.total_blocked, 1);
        assert_eq!(stats.total_injections, 1);
        assert!((stats.block_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    // === Config Tests ===

    #[test]
    fn unordered_thresholds_fail_validation() {
        let result = RiskMonitor::with_config(MonitorConfig {
            medium_threshold: 50.0,
            high_threshold: 25.0,
            ..MonitorConfig::default()
        });
        assert!(matches!(result, Err(ConfigError::InvalidThresholds { .. })));
    }

    #[test]
    fn negative_decay_fails_validation() {
        let result = RiskMonitor::with_config(MonitorConfig {
            decay_rate_per_hour: -1.0,
            ..MonitorConfig::default()
        });
        assert!(matches!(result, Err(ConfigError::InvalidLimit { .. })));
    }
}
