//! Fixed-duration counting windows and per-subject usage state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A fixed-duration counting window for requests and cost units.
///
/// A window never holds counts from two different duration periods: counts
/// reset and `start` advances to `now` exactly when the window has expired.
#[derive(Debug, Clone, Copy)]
pub struct QuotaWindow {
    /// When the current period began.
    pub start: DateTime<Utc>,
    /// Requests counted in the current period.
    pub requests: u64,
    /// Cost units counted in the current period.
    pub cost: u64,
    duration_seconds: i64,
}

impl QuotaWindow {
    /// Creates an empty window starting at `now`.
    pub fn new(duration_seconds: i64, now: DateTime<Utc>) -> Self {
        Self {
            start: now,
            requests: 0,
            cost: 0,
            duration_seconds,
        }
    }

    /// Zeroes the counts and restarts the period if it has expired.
    pub fn roll_if_expired(&mut self, now: DateTime<Utc>) {
        if now - self.start >= Duration::seconds(self.duration_seconds) {
            self.requests = 0;
            self.cost = 0;
            self.start = now;
        }
    }

    /// Seconds until the current period ends.
    pub fn seconds_until_reset(&self, now: DateTime<Utc>) -> i64 {
        (self.duration_seconds - (now - self.start).num_seconds()).max(0)
    }

    /// When the current period ends.
    pub fn reset_at(&self) -> DateTime<Utc> {
        self.start + Duration::seconds(self.duration_seconds)
    }

    /// True if the window has outlived its period without being touched.
    pub fn is_stale(&self, now: DateTime<Utc>, idle_seconds: i64) -> bool {
        now - self.start >= Duration::seconds(idle_seconds)
    }
}

/// Per-subject rate-limit state: three windows, cooldown, lifetime totals.
#[derive(Debug, Clone)]
pub struct SubjectUsage {
    /// One-minute window.
    pub minute: QuotaWindow,
    /// One-hour window.
    pub hour: QuotaWindow,
    /// One-day window.
    pub day: QuotaWindow,
    /// Requests rejected until this instant, if set.
    pub cooldown_until: Option<DateTime<Utc>>,
    /// Lifetime request count.
    pub total_requests: u64,
    /// Lifetime cost units.
    pub total_cost: u64,
    /// Lifetime rejected checks.
    pub total_rejections: u64,
}

impl SubjectUsage {
    /// Creates fresh state with all windows starting at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            minute: QuotaWindow::new(60, now),
            hour: QuotaWindow::new(3_600, now),
            day: QuotaWindow::new(86_400, now),
            cooldown_until: None,
            total_requests: 0,
            total_cost: 0,
            total_rejections: 0,
        }
    }

    /// Rolls all three windows forward.
    pub fn roll_windows(&mut self, now: DateTime<Utc>) {
        self.minute.roll_if_expired(now);
        self.hour.roll_if_expired(now);
        self.day.roll_if_expired(now);
    }

    /// True if the subject is inside a cooldown period.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }
}

/// Point-in-time usage numbers for one subject.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Requests in the current minute window.
    pub minute_requests: u64,
    /// Requests in the current hour window.
    pub hour_requests: u64,
    /// Requests in the current day window.
    pub day_requests: u64,
    /// Cost units in the current minute window.
    pub minute_cost: u64,
    /// Cost units in the current hour window.
    pub hour_cost: u64,
    /// Cost units in the current day window.
    pub day_cost: u64,
    /// Lifetime request count.
    pub total_requests: u64,
    /// Lifetime cost units.
    pub total_cost: u64,
    /// Lifetime rejected checks.
    pub total_rejections: u64,
    /// Whether the subject is currently in cooldown.
    pub in_cooldown: bool,
}
