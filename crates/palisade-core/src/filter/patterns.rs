//! Built-in category pattern tables.
//!
//! Patterns are compiled once at filter construction. Word boundaries keep
//! false positives down (e.g. "skill" must not match "kill").

use regex::{Regex, RegexSet};

use super::level::FilterLevel;

/// Category name reported when the exact-match blocklist fires.
pub const BLOCKLIST_CATEGORY: &str = "blocklist";

/// A harm category with its pre-compiled patterns and fixed severity.
pub struct CategoryRules {
    /// Category name as reported in verdicts.
    pub name: &'static str,
    /// Severity assigned when any pattern in this category matches.
    pub level: FilterLevel,
    /// Regex set for the fast any-match check.
    pub regex_set: RegexSet,
    /// Individual regexes for extracting the matched text.
    pub regexes: Vec<Regex>,
}

impl CategoryRules {
    fn new(name: &'static str, level: FilterLevel, patterns: &[&str]) -> Self {
        let regex_set = RegexSet::new(patterns).expect("invalid built-in patterns");
        let regexes = patterns
            .iter()
            .map(|p| Regex::new(p).expect("invalid built-in pattern"))
            .collect();

        Self {
            name,
            level,
            regex_set,
            regexes,
        }
    }

    /// Returns the first matched literal in `text`, if any pattern matches.
    pub fn first_match<'t>(&self, text: &'t str) -> Option<&'t str> {
        if !self.regex_set.is_match(text) {
            return None;
        }
        self.regexes
            .iter()
            .find_map(|regex| regex.find(text))
            .map(|m| m.as_str())
    }
}

/// Builds the default category tables in check order.
pub fn built_in_categories() -> Vec<CategoryRules> {
    vec![
        violence(),
        hate_speech(),
        illegal_activity(),
        pii(),
        prompt_injection(),
    ]
}

fn violence() -> CategoryRules {
    let patterns = [
        r"(?i)\b(kill|murder|assassinate|bomb|explode|attack)\b.*\b(people|person|someone|them)\b",
        r"(?i)\bhow\s+to\s+(make|build|create)\s+(a\s+)?(bomb|weapon|explosive)\b",
        r"(?i)\b(hurt|harm|injure)\s+(myself|yourself|themselves)\b",
    ];
    CategoryRules::new("violence", FilterLevel::BlockHard, &patterns)
}

fn hate_speech() -> CategoryRules {
    let patterns = [
        r"(?i)\b(hate|kill|destroy)\s+all\s+\w+\b",
        r"(?i)\b(racial|ethnic)\s+slurs?\b",
    ];
    CategoryRules::new("hate_speech", FilterLevel::BlockHard, &patterns)
}

fn illegal_activity() -> CategoryRules {
    let patterns = [
        r"(?i)\bhow\s+to\s+(hack|crack|break\s+into)\b",
        r"(?i)\b(steal|fraud|scam)\s+(money|credit|identity)\b",
        r"(?i)\b(buy|sell|make)\s+(drugs|meth|cocaine|heroin)\b",
    ];
    CategoryRules::new("illegal_activity", FilterLevel::BlockSoft, &patterns)
}

fn pii() -> CategoryRules {
    let patterns = [SSN_PATTERN, CREDIT_CARD_PATTERN, EMAIL_PATTERN];
    CategoryRules::new("pii_detected", FilterLevel::Warn, &patterns)
}

fn prompt_injection() -> CategoryRules {
    let patterns = [
        r"(?i)ignore\s+(all\s+)?(previous|prior|above)\s+instructions",
        r"(?i)disregard\s+(all\s+)?(previous|prior|above)",
        r"(?i)you\s+are\s+now\s+[a-z]+\s+(mode|persona)",
        r"(?i)forget\s+(everything|all|your\s+instructions)",
        r"(?i)new\s+instructions?:\s*",
        r"(?i)system\s*:\s*you\s+are",
        r"(?i)\[system\]|\[assistant\]|\[user\]",
    ];
    CategoryRules::new("prompt_injection", FilterLevel::BlockHard, &patterns)
}

// PII subtypes get distinct redaction placeholders, so their patterns are
// shared between the category table and the sanitizer.
pub(super) const SSN_PATTERN: &str = r"\b\d{3}[-.]?\d{2}[-.]?\d{4}\b";
pub(super) const CREDIT_CARD_PATTERN: &str = r"\b\d{16}\b";
pub(super) const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";

/// One PII subtype with its redaction placeholder.
pub struct PiiRule {
    /// Pattern locating the PII span.
    pub regex: Regex,
    /// Fixed placeholder substituted for each match.
    pub placeholder: &'static str,
}

/// Builds the PII redaction rules in application order.
pub fn pii_redaction_rules() -> Vec<PiiRule> {
    [
        (SSN_PATTERN, "[SSN REDACTED]"),
        (CREDIT_CARD_PATTERN, "[CC REDACTED]"),
        (EMAIL_PATTERN, "[EMAIL REDACTED]"),
    ]
    .into_iter()
    .map(|(pattern, placeholder)| PiiRule {
        regex: Regex::new(pattern).expect("invalid built-in pattern"),
        placeholder,
    })
    .collect()
}
