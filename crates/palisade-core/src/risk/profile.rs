//! Risk levels, behavioral flags, and per-subject profiles.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Subject risk classification.
///
/// Variants are declared in ascending severity; `Blocked` is sticky and only
/// cleared by an explicit unblock.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Normal behavior.
    #[default]
    Low,
    /// Some concerning patterns.
    Medium,
    /// Multiple red flags.
    High,
    /// Immediate attention needed.
    Critical,
    /// Subject is blocked.
    Blocked,
}

impl RiskLevel {
    /// Returns the level as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
            RiskLevel::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Behavioral flags assignable to a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorFlag {
    // Content-related
    /// Repeatedly submitted blocked content.
    RepeatedBlockedContent,
    /// Attempted prompt injection more than once.
    PromptInjectionAttempts,
    /// Submitted personally identifiable information.
    PiiSubmission,
    /// Requested harmful content.
    HarmfulContentRequests,

    // Usage patterns
    /// Unusually high request volume.
    ExcessiveRequests,
    /// Activity at unusual hours.
    UnusualHours,
    /// Burst of requests inside the rapid-fire window.
    RapidFireRequests,
    /// Very long sessions.
    LongSessions,

    // Evasion attempts
    /// Attempted to circumvent content filters.
    FilterCircumvention,
    /// Suspected of operating multiple accounts.
    MultipleAccountsSuspected,
    /// Connecting through a VPN or proxy.
    VpnOrProxy,

    // Positive signals
    /// Identity-verified subject.
    VerifiedUser,
    /// Account has a long history.
    LongStandingAccount,
    /// Consistent good behavior.
    GoodStanding,
}

impl BehaviorFlag {
    /// True for flags that reduce rather than raise risk.
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            BehaviorFlag::VerifiedUser
                | BehaviorFlag::LongStandingAccount
                | BehaviorFlag::GoodStanding
        )
    }
}

/// Kinds of behavior events recorded against a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A request that passed all checks.
    Request,
    /// A request rejected by the content filter.
    BlockedContent,
    /// A detected prompt-injection attempt.
    InjectionAttempt,
    /// A detected filter-circumvention attempt.
    FilterCircumvention,
    /// A burst exceeding the rapid-fire threshold.
    RapidFire,
    /// The subject was blocked.
    Blocked,
    /// The subject was unblocked.
    Unblocked,
}

impl EventKind {
    /// Severity weight on the 0-20 scale.
    pub fn severity(&self) -> u8 {
        match self {
            EventKind::Request => 0,
            EventKind::BlockedContent => 5,
            EventKind::InjectionAttempt => 15,
            EventKind::FilterCircumvention => 20,
            EventKind::RapidFire => 5,
            EventKind::Blocked => 10,
            EventKind::Unblocked => 0,
        }
    }
}

/// A single recorded behavior event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorEvent {
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
    /// Severity weight at recording time (0-20).
    pub severity: u8,
    /// Free-form context for review.
    pub details: serde_json::Value,
}

/// A subject's behavior profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Subject this profile belongs to.
    pub subject_id: String,
    /// Current risk classification.
    pub level: RiskLevel,
    /// Decaying risk score; zero or above, unbounded above.
    pub score: f64,
    /// Flags assigned so far, in assignment order.
    pub flags: Vec<BehaviorFlag>,
    /// Lifetime request count.
    pub total_requests: u64,
    /// Requests rejected by checks.
    pub blocked_requests: u64,
    /// Injection attempts recorded.
    pub injection_attempts: u64,
    /// Content-filter violations recorded.
    pub filter_violations: u64,
    /// First time this subject was seen.
    pub first_seen: DateTime<Utc>,
    /// Most recent request time.
    pub last_seen: DateTime<Utc>,
    /// Sessions observed.
    pub session_count: u64,
    /// Bounded ring of recent events; oldest silently discarded.
    pub recent_events: VecDeque<BehaviorEvent>,
    /// Instant up to which decay has been applied.
    pub decayed_at: DateTime<Utc>,
}

impl RiskProfile {
    /// Creates a fresh profile for `subject_id` first seen at `now`.
    pub fn new(subject_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            level: RiskLevel::Low,
            score: 0.0,
            flags: Vec::new(),
            total_requests: 0,
            blocked_requests: 0,
            injection_attempts: 0,
            filter_violations: 0,
            first_seen: now,
            last_seen: now,
            session_count: 1,
            recent_events: VecDeque::new(),
            decayed_at: now,
        }
    }

    /// Appends an event, evicting the oldest once `capacity` is reached.
    pub fn add_event(
        &mut self,
        kind: EventKind,
        details: serde_json::Value,
        now: DateTime<Utc>,
        capacity: usize,
    ) {
        if self.recent_events.len() >= capacity {
            self.recent_events.pop_front();
        }
        self.recent_events.push_back(BehaviorEvent {
            timestamp: now,
            kind,
            severity: kind.severity(),
            details,
        });
    }

    /// Adds a flag if not already present; returns true when newly added.
    pub fn add_flag(&mut self, flag: BehaviorFlag) -> bool {
        if self.flags.contains(&flag) {
            return false;
        }
        self.flags.push(flag);
        true
    }

    /// Counts events recorded within the trailing `window_seconds`.
    pub fn recent_event_count(&self, window_seconds: i64, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::seconds(window_seconds);
        self.recent_events
            .iter()
            .filter(|event| event.timestamp > cutoff)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn risk_levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert!(RiskLevel::Critical < RiskLevel::Blocked);
    }

    #[test]
    fn positive_flags_are_identified() {
        assert!(BehaviorFlag::VerifiedUser.is_positive());
        assert!(BehaviorFlag::GoodStanding.is_positive());
        assert!(!BehaviorFlag::FilterCircumvention.is_positive());
    }

    #[test]
    fn event_severities_fit_the_scale() {
        for kind in [
            EventKind::Request,
            EventKind::BlockedContent,
            EventKind::InjectionAttempt,
            EventKind::FilterCircumvention,
            EventKind::RapidFire,
            EventKind::Blocked,
            EventKind::Unblocked,
        ] {
            assert!(kind.severity() <= 20);
        }
        assert_eq!(EventKind::FilterCircumvention.severity(), 20);
    }

    #[test]
    fn event_ring_discards_oldest() {
        let mut profile = RiskProfile::new("u1", at(0));
        for i in 0..5 {
            profile.add_event(EventKind::Request, serde_json::json!({}), at(i), 3);
        }
        assert_eq!(profile.recent_events.len(), 3);
        assert_eq!(profile.recent_events.front().unwrap().timestamp, at(2));
    }

    #[test]
    fn flags_are_added_once() {
        let mut profile = RiskProfile::new("u1", at(0));
        assert!(profile.add_flag(BehaviorFlag::RapidFireRequests));
        assert!(!profile.add_flag(BehaviorFlag::RapidFireRequests));
        assert_eq!(profile.flags.len(), 1);
    }

    #[test]
    fn recent_event_count_respects_window() {
        let mut profile = RiskProfile::new("u1", at(0));
        profile.add_event(EventKind::Request, serde_json::json!({}), at(0), 100);
        profile.add_event(EventKind::Request, serde_json::json!({}), at(50), 100);
        profile.add_event(EventKind::Request, serde_json::json!({}), at(100), 100);
        assert_eq!(profile.recent_event_count(60, at(100)), 2);
    }
}
