//! Multi-category content filtering for AI agent inputs and outputs.
//!
//! Detects hate speech, violence and self-harm, illegal activity, PII, and
//! prompt-injection markers using pre-compiled regex tables, and produces a
//! single ordered severity verdict. Detection is deterministic pattern
//! matching, not model inference.

mod level;
mod patterns;

pub use level::{FilterLevel, FilterVerdict};

use std::collections::HashMap;
use std::sync::Mutex;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use patterns::{built_in_categories, pii_redaction_rules, CategoryRules, PiiRule, BLOCKLIST_CATEGORY};

/// Configuration for the content filter.
///
/// Every category toggle is independent; custom patterns and the blocklist
/// are caller-supplied extensions on top of the built-in tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Detect violence and self-harm content.
    pub enable_violence_filter: bool,
    /// Detect hate speech.
    pub enable_hate_filter: bool,
    /// Detect illegal-activity content.
    pub enable_illegal_filter: bool,
    /// Detect personally identifiable information.
    pub enable_pii_filter: bool,
    /// Detect prompt-injection markers.
    pub enable_injection_filter: bool,
    /// Additional regex patterns by category name; matches warn only.
    pub custom_patterns: HashMap<String, Vec<String>>,
    /// Exact-substring blocklist (case-insensitive); matches hard-block.
    pub custom_blocklist: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enable_violence_filter: true,
            enable_hate_filter: true,
            enable_illegal_filter: true,
            enable_pii_filter: true,
            enable_injection_filter: true,
            custom_patterns: HashMap::new(),
            custom_blocklist: Vec::new(),
        }
    }
}

impl FilterConfig {
    fn category_enabled(&self, name: &str) -> bool {
        match name {
            "violence" => self.enable_violence_filter,
            "hate_speech" => self.enable_hate_filter,
            "illegal_activity" => self.enable_illegal_filter,
            "pii_detected" => self.enable_pii_filter,
            "prompt_injection" => self.enable_injection_filter,
            _ => true,
        }
    }
}

/// Filtering counters for observability.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FilterStats {
    /// Total checks performed.
    pub total_checks: u64,
    /// Checks that came back Allow.
    pub allowed: u64,
    /// Checks that came back Warn.
    pub warned: u64,
    /// Checks that came back BlockSoft or BlockHard.
    pub blocked: u64,
}

struct CustomCategory {
    name: String,
    regexes: Vec<Regex>,
}

/// Multi-category content filter.
///
/// Pattern matching is lock-free; only the counters sit behind a mutex, so
/// the filter is safely callable from many tasks at once.
///
/// # Example
///
/// ```
/// use palisade_core::filter::ContentFilter;
///
/// let filter = ContentFilter::new();
/// let verdict = filter.check("How do I make a bomb?");
/// assert!(verdict.is_blocked());
/// ```
pub struct ContentFilter {
    config: FilterConfig,
    categories: Vec<CategoryRules>,
    custom_categories: Vec<CustomCategory>,
    blocklist_lower: Vec<String>,
    pii_rules: Vec<PiiRule>,
    stats: Mutex<FilterStats>,
}

impl ContentFilter {
    /// Creates a filter with all built-in categories enabled.
    pub fn new() -> Self {
        Self::with_config(FilterConfig::default())
            .unwrap_or_else(|_| unreachable!("default config has no custom patterns"))
    }

    /// Creates a filter from the given configuration.
    ///
    /// Custom patterns are compiled here; an invalid pattern fails
    /// construction rather than surfacing at request time.
    pub fn with_config(config: FilterConfig) -> Result<Self, ConfigError> {
        let mut custom_categories = Vec::new();
        for (name, raw_patterns) in &config.custom_patterns {
            let mut regexes = Vec::new();
            for raw in raw_patterns {
                let regex = Regex::new(raw).map_err(|source| ConfigError::InvalidPattern {
                    category: name.clone(),
                    source,
                })?;
                regexes.push(regex);
            }
            custom_categories.push(CustomCategory {
                name: name.clone(),
                regexes,
            });
        }
        // Deterministic custom-category order regardless of map iteration.
        custom_categories.sort_by(|a, b| a.name.cmp(&b.name));

        let blocklist_lower = config
            .custom_blocklist
            .iter()
            .map(|term| term.to_lowercase())
            .collect();

        Ok(Self {
            config,
            categories: built_in_categories(),
            custom_categories,
            blocklist_lower,
            pii_rules: pii_redaction_rules(),
            stats: Mutex::new(FilterStats::default()),
        })
    }

    /// Checks content against the blocklist and all enabled categories.
    ///
    /// The verdict level is the maximum across matched categories; blocklist
    /// hits always hard-block, custom patterns at most warn.
    pub fn check(&self, content: &str) -> FilterVerdict {
        if content.trim().is_empty() {
            self.count(FilterLevel::Allow);
            return FilterVerdict::allow();
        }

        let mut categories: Vec<String> = Vec::new();
        let mut matched_patterns: Vec<String> = Vec::new();
        let mut level = FilterLevel::Allow;

        // Blocklist first: exact substring, case-insensitive, never overridable.
        let content_lower = content.to_lowercase();
        for (term_lower, term) in self
            .blocklist_lower
            .iter()
            .zip(&self.config.custom_blocklist)
        {
            if content_lower.contains(term_lower) {
                if !categories.iter().any(|c| c == BLOCKLIST_CATEGORY) {
                    categories.push(BLOCKLIST_CATEGORY.to_string());
                }
                matched_patterns.push(term.clone());
                level = FilterLevel::BlockHard;
            }
        }

        // Built-in categories: first match per category bounds output size.
        for rules in &self.categories {
            if !self.config.category_enabled(rules.name) {
                continue;
            }
            if let Some(matched) = rules.first_match(content) {
                categories.push(rules.name.to_string());
                matched_patterns.push(matched.to_string());
                level = level.max(rules.level);
            }
        }

        // Custom patterns only ever raise Allow to Warn.
        for custom in &self.custom_categories {
            if let Some(matched) = custom.regexes.iter().find_map(|r| r.find(content)) {
                categories.push(format!("custom:{}", custom.name));
                matched_patterns.push(matched.as_str().to_string());
                level = level.max(FilterLevel::Warn);
            }
        }

        let message = match level {
            FilterLevel::BlockHard => format!("Content blocked (hard): {}", categories.join(", ")),
            FilterLevel::BlockSoft => format!("Content blocked (soft): {}", categories.join(", ")),
            FilterLevel::Warn => format!("Content warning: {}", categories.join(", ")),
            FilterLevel::Allow => String::new(),
        };
        self.count(level);

        let verdict = FilterVerdict {
            level,
            confidence: if categories.is_empty() { 1.0 } else { 0.85 },
            categories,
            matched_patterns,
            message,
        };

        if verdict.is_blocked() {
            tracing::warn!(
                level = %verdict.level,
                categories = ?verdict.categories,
                "content filter blocked input"
            );
        }

        verdict
    }

    /// Masks PII spans with fixed placeholder tokens.
    ///
    /// Independent of the block decision; surrounding text is untouched.
    pub fn sanitize_pii(&self, content: &str) -> String {
        let mut result = content.to_string();
        for rule in &self.pii_rules {
            result = rule
                .regex
                .replace_all(&result, rule.placeholder)
                .into_owned();
        }
        result
    }

    /// Returns a snapshot of the filtering counters.
    pub fn stats(&self) -> FilterStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }

    fn count(&self, level: FilterLevel) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.total_checks += 1;
            match level {
                FilterLevel::Allow => stats.allowed += 1,
                FilterLevel::Warn => stats.warned += 1,
                FilterLevel::BlockSoft | FilterLevel::BlockHard => stats.blocked += 1,
            }
        }
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new()
    }
}
