// [[VIGIL]]/apps/watch-server/src/patterns.rs
// Purpose: Ordered help-classification rules applied to assistant utterances.
// Architecture: Cortex Layer
// Dependencies: Regex

use regex::Regex;

/// One classification rule: a short operator-facing label plus the phrase
/// pattern that triggers it.
#[derive(Debug)]
pub struct HelpRule {
    pub label: &'static str,
    regex: Regex,
}

impl HelpRule {
    fn new(label: &'static str, pattern: &str) -> Self {
        HelpRule {
            label,
            // Built-in patterns are static literals; a bad one is a
            // programming error caught by the rule-table test.
            regex: Regex::new(pattern).expect("built-in help rule pattern"),
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// The fixed, ordered rule table. Evaluation is top-to-bottom and the first
/// matching rule wins, short-circuiting the rest: specific, actionable
/// phrasings sit above generic ones so that a plain "error"/"failed" pattern
/// never masks a precise help request.
pub struct RuleSet {
    rules: Vec<HelpRule>,
}

impl RuleSet {
    pub fn builtin() -> Self {
        RuleSet {
            rules: vec![
                HelpRule::new(
                    "asking for help",
                    r"(?i)\bi need (some )?help\b|\bneed your help\b|\bplease help\b|\bcan you help\b",
                ),
                HelpRule::new(
                    "cannot proceed",
                    r"(?i)\bi'?m stuck\b|\bi am stuck\b|\b(cannot|can'?t|unable to) proceed\b",
                ),
                HelpRule::new(
                    "waiting for input",
                    r"(?i)\b(waiting|awaiting) (for )?(your )?(input|response|reply|instructions)\b",
                ),
                HelpRule::new(
                    "awaiting confirmation",
                    r"(?i)\bshould i (proceed|continue)\b|\bdo you want me to\b|\bwould you like me to\b|\bshall i\b",
                ),
                HelpRule::new(
                    "uncertain how to continue",
                    r"(?i)\bi'?m not sure\b|\bi am not sure\b|\bnot sure (how|what|whether)\b|\bunsure (how|what|whether)\b",
                ),
                HelpRule::new(
                    "hit an error",
                    r"(?i)\ban error occurred\b|\bencountered an error\b|\bgetting an error\b",
                ),
                HelpRule::new(
                    "task failed",
                    r"(?i)\bfailed to\b|\bfailure\b|\bcould not complete\b",
                ),
                HelpRule::new(
                    "cannot access or find",
                    r"(?i)\b(cannot|can'?t|unable to) (access|find|locate|complete)\b",
                ),
                HelpRule::new(
                    "permission denied",
                    r"(?i)\bpermission denied\b|\baccess (is )?denied\b|\bnot permitted\b",
                ),
            ],
        }
    }

    /// First matching rule in priority order, or None.
    pub fn classify(&self, text: &str) -> Option<&HelpRule> {
        self.rules.iter().find(|rule| rule.is_match(text))
    }

    /// The table itself, in evaluation order. Order is a first-class,
    /// inspectable property.
    pub fn rules(&self) -> &[HelpRule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_order_is_inspectable() {
        let rules = RuleSet::builtin();
        let labels: Vec<&str> = rules.rules().iter().map(|r| r.label).collect();
        assert_eq!(
            labels,
            vec![
                "asking for help",
                "cannot proceed",
                "waiting for input",
                "awaiting confirmation",
                "uncertain how to continue",
                "hit an error",
                "task failed",
                "cannot access or find",
                "permission denied",
            ]
        );
    }

    #[test]
    fn test_help_request_beats_generic_failure() {
        let rules = RuleSet::builtin();
        let rule = rules
            .classify("I need help: the deploy failed to finish")
            .unwrap();
        assert_eq!(rule.label, "asking for help");
    }

    #[test]
    fn test_cannot_proceed_classification() {
        let rules = RuleSet::builtin();
        let rule = rules.classify("I cannot proceed without access").unwrap();
        assert_eq!(rule.label, "cannot proceed");
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let rules = RuleSet::builtin();
        let rule = rules.classify("PERMISSION DENIED while reading /etc").unwrap();
        assert_eq!(rule.label, "permission denied");
    }

    #[test]
    fn test_generic_failure_still_matches_alone() {
        let rules = RuleSet::builtin();
        let rule = rules.classify("the build failed to compile").unwrap();
        assert_eq!(rule.label, "task failed");
    }

    #[test]
    fn test_benign_text_matches_nothing() {
        let rules = RuleSet::builtin();
        assert!(rules.classify("All tasks completed successfully.").is_none());
    }
}
