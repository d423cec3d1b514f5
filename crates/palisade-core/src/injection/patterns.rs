//! Injection pattern table.
//!
//! An ordered, immutable table of (pattern, type, confidence, description)
//! rows. Row order encodes priority: detection returns the first row that
//! matches and clears the sensitivity threshold, so an earlier
//! lower-confidence row wins over a later higher-confidence one.

use regex::Regex;

use super::InjectionType;

/// One row of the injection pattern table.
pub struct InjectionRule {
    /// Pre-compiled detection pattern.
    pub regex: Regex,
    /// Attack type this row detects.
    pub injection_type: InjectionType,
    /// Fixed confidence reported on a match.
    pub confidence: f64,
    /// Short human-readable description of the technique.
    pub description: &'static str,
}

/// Builds the pattern table in priority order.
pub fn injection_rules() -> Vec<InjectionRule> {
    use InjectionType::*;

    let rows: &[(&str, InjectionType, f64, &str)] = &[
        // Direct injection
        (
            r"(?i)ignore\s+(all\s+)?(previous|prior|above)\s+(instructions?|prompts?|rules?)",
            DirectInjection,
            0.95,
            "Ignore previous instructions",
        ),
        (
            r"(?i)disregard\s+(all\s+)?(previous|prior|above|your)\s+(instructions?|guidelines?)",
            DirectInjection,
            0.95,
            "Disregard instructions",
        ),
        (
            r"(?i)forget\s+(everything|all|your)\s+(instructions?|training|rules?)",
            DirectInjection,
            0.90,
            "Forget instructions",
        ),
        (
            r"(?i)new\s+(system\s+)?instructions?:\s*",
            DirectInjection,
            0.85,
            "New instructions marker",
        ),
        (
            r"(?i)override\s+(all\s+)?(safety|security|content)\s+(filters?|checks?)",
            DirectInjection,
            0.95,
            "Override safety filters",
        ),
        // Role hijacking
        (
            r"(?i)you\s+are\s+(now|no\s+longer)\s+(a|an)?\s*\w+\s*(mode|persona|character)?",
            RoleHijack,
            0.85,
            "Role change attempt",
        ),
        (
            r"(?i)pretend\s+(you\s+are|to\s+be)\s+(a|an)?\s*\w+",
            RoleHijack,
            0.75,
            "Pretend to be",
        ),
        (
            r"(?i)act\s+as\s+(if\s+you\s+are\s+)?(a|an)?\s*\w+\s*(without|with\s+no)\s*(restrictions?|limits?)",
            RoleHijack,
            0.90,
            "Act without restrictions",
        ),
        (
            r"(?i)roleplay\s+as\s+(a|an)?\s*\w+\s*(that|who)\s*(can|will|does)",
            RoleHijack,
            0.80,
            "Roleplay with capabilities",
        ),
        // Jailbreak attempts
        (
            r"(?i)\b(dan|do\s+anything\s+now)\b\s*(mode|prompt)?",
            Jailbreak,
            0.95,
            "DAN jailbreak",
        ),
        (
            r"(?i)(developer|debug|admin|god)\s+mode",
            Jailbreak,
            0.90,
            "Special mode request",
        ),
        (
            r"(?i)bypass\s+(all\s+)?(safety|security|ethical|content)\s*(guidelines?|filters?|restrictions?)?",
            Jailbreak,
            0.95,
            "Bypass safety",
        ),
        (
            r"(?i)(hypothetically|theoretically|in\s+fiction)\s*[,:]?\s*(how|what)\s+(would|could|can)",
            Jailbreak,
            0.60,
            "Hypothetical framing",
        ),
        (
            r"(?i)for\s+(educational|research|academic)\s+purposes?\s*[,:]?\s*(how|explain)",
            Jailbreak,
            0.55,
            "Educational framing",
        ),
        // Context manipulation
        (
            r"(?i)\[system\]|\[assistant\]|\[user\]|\[human\]",
            ContextManipulation,
            0.90,
            "Fake role markers",
        ),
        (
            r"(?i)<\|?(system|assistant|user|human)\|?>",
            ContextManipulation,
            0.90,
            "Fake role delimiters",
        ),
        (
            r"(?i)```(system|prompt|instructions?)\n",
            ContextManipulation,
            0.80,
            "Code block injection",
        ),
        (
            r"(?i)end\s+of\s+(system|user)\s+(prompt|message|input)",
            ContextManipulation,
            0.85,
            "Fake message boundary",
        ),
        // Data exfiltration
        (
            r"(?i)(repeat|show|reveal|print)\s+(your\s+)?(system\s+)?(prompt|instructions?|guidelines?)",
            DataExfiltration,
            0.85,
            "Reveal system prompt",
        ),
        (
            r"(?i)what\s+(are|were)\s+(your|the)\s+(original\s+)?(instructions?|prompt|guidelines?)",
            DataExfiltration,
            0.80,
            "Query instructions",
        ),
        (
            r"(?i)(output|display|echo)\s+(the\s+)?(entire|full|complete)\s+(context|prompt|instructions?)",
            DataExfiltration,
            0.90,
            "Output full context",
        ),
    ];

    rows.iter()
        .map(|(pattern, injection_type, confidence, description)| InjectionRule {
            regex: Regex::new(pattern).expect("invalid built-in pattern"),
            injection_type: *injection_type,
            confidence: *confidence,
            description,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_all_five_types() {
        let rules = injection_rules();
        for ty in [
            InjectionType::DirectInjection,
            InjectionType::RoleHijack,
            InjectionType::Jailbreak,
            InjectionType::ContextManipulation,
            InjectionType::DataExfiltration,
        ] {
            assert!(
                rules.iter().any(|r| r.injection_type == ty),
                "no rule for {ty:?}"
            );
        }
    }

    #[test]
    fn direct_injection_rows_come_first() {
        let rules = injection_rules();
        assert_eq!(rules[0].injection_type, InjectionType::DirectInjection);
        assert!(rules[0].confidence >= 0.9);
    }

    #[test]
    fn dan_requires_word_boundary() {
        let rules = injection_rules();
        let dan = rules
            .iter()
            .find(|r| r.description == "DAN jailbreak")
            .unwrap();
        assert!(dan.regex.is_match("enable DAN mode"));
        assert!(!dan.regex.is_match("the dancer is dancing"));
    }
}
