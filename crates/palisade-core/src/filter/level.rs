//! Filter severity levels and verdicts.

use serde::{Deserialize, Serialize};

/// Severity level assigned to filtered content.
///
/// Variants are declared in ascending severity so the derived ordering can
/// be used to fold multiple category matches into a single level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FilterLevel {
    /// Content is safe.
    #[default]
    Allow,
    /// Content is borderline; surfaced as a warning.
    Warn,
    /// Blocked, but configuration may let the caller proceed.
    BlockSoft,
    /// Always blocked; cannot be overridden by configuration.
    BlockHard,
}

impl FilterLevel {
    /// Returns the level as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterLevel::Allow => "allow",
            FilterLevel::Warn => "warn",
            FilterLevel::BlockSoft => "block_soft",
            FilterLevel::BlockHard => "block_hard",
        }
    }
}

impl std::fmt::Display for FilterLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of checking a piece of content against the filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterVerdict {
    /// Highest severity level across all matched categories.
    pub level: FilterLevel,
    /// Names of the categories that matched, in match order.
    pub categories: Vec<String>,
    /// The literal text each category matched on (one per category).
    pub matched_patterns: Vec<String>,
    /// Confidence score (0.0 to 1.0).
    pub confidence: f64,
    /// Human-readable summary of the decision.
    pub message: String,
}

impl FilterVerdict {
    /// Creates a verdict for safe content.
    pub fn allow() -> Self {
        Self {
            level: FilterLevel::Allow,
            categories: Vec::new(),
            matched_patterns: Vec::new(),
            confidence: 1.0,
            message: String::new(),
        }
    }

    /// Returns true if the content should be blocked (soft or hard).
    pub fn is_blocked(&self) -> bool {
        matches!(self.level, FilterLevel::BlockSoft | FilterLevel::BlockHard)
    }

    /// Returns true if the content is hard-blocked (no override).
    pub fn is_hard_blocked(&self) -> bool {
        self.level == FilterLevel::BlockHard
    }

    /// Returns true if any category matched.
    pub fn has_matches(&self) -> bool {
        !self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_is_ascending() {
        assert!(FilterLevel::Allow < FilterLevel::Warn);
        assert!(FilterLevel::Warn < FilterLevel::BlockSoft);
        assert!(FilterLevel::BlockSoft < FilterLevel::BlockHard);
    }

    #[test]
    fn max_fold_picks_most_severe() {
        let levels = [FilterLevel::Warn, FilterLevel::BlockHard, FilterLevel::BlockSoft];
        let highest = levels.iter().copied().max().unwrap();
        assert_eq!(highest, FilterLevel::BlockHard);
    }

    #[test]
    fn level_serializes_snake_case() {
        let json = serde_json::to_string(&FilterLevel::BlockSoft).unwrap();
        assert_eq!(json, "\"block_soft\"");
    }

    #[test]
    fn allow_verdict_is_clean() {
        let verdict = FilterVerdict::allow();
        assert_eq!(verdict.level, FilterLevel::Allow);
        assert!(!verdict.is_blocked());
        assert!(!verdict.has_matches());
        assert_eq!(verdict.confidence, 1.0);
    }

    #[test]
    fn blocked_helpers_track_level() {
        let mut verdict = FilterVerdict::allow();
        verdict.level = FilterLevel::BlockSoft;
        assert!(verdict.is_blocked());
        assert!(!verdict.is_hard_blocked());

        verdict.level = FilterLevel::BlockHard;
        assert!(verdict.is_blocked());
        assert!(verdict.is_hard_blocked());
    }
}
