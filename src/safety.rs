//! Safety validation for outbound responses.
//!
//! Every response runs through these checks before dispatch, regardless of
//! whether it came from the cache, a template, or the AI client. A failed
//! verdict never reaches the platform.

use regex::Regex;
use tracing::warn;

/// Hard cap on outbound response length, in characters.
const MAX_RESPONSE_LEN: usize = 1000;

/// Mentions beyond this count look like mass-tagging.
const MAX_MENTIONS: usize = 3;

/// Uppercase ratio above this (on sufficiently long text) reads as shouting.
const SHOUTING_RATIO: f64 = 0.7;
const SHOUTING_MIN_LEN: usize = 12;

/// Terms that disqualify a response outright.
const BLOCKED_TERMS: &[&str] = &[
    "kill yourself",
    "kys",
    "idiot",
    "stupid",
    "moron",
    "hate you",
    "shut up",
];

/// Outcome of a safety check.
#[derive(Debug, Clone)]
pub struct SafetyVerdict {
    pub passed: bool,
    /// One note per failed check, empty on pass.
    pub notes: Vec<String>,
}

impl SafetyVerdict {
    /// Notes joined for persistence, `None` when clean.
    pub fn notes_summary(&self) -> Option<String> {
        if self.notes.is_empty() {
            None
        } else {
            Some(self.notes.join("; "))
        }
    }
}

/// Validates outbound response text against content policies.
pub struct SafetyValidator {
    link_pattern: Regex,
    mention_pattern: Regex,
}

impl SafetyValidator {
    pub fn new() -> Self {
        Self {
            link_pattern: Regex::new(
                r"(?i)\bhttps?://|\bwww\.|\b[a-z0-9-]+\.(com|net|org|io|gg|ly|to)\b",
            )
            .unwrap(),
            mention_pattern: Regex::new(r"@\w+").unwrap(),
        }
    }

    /// Check a candidate response. Collects every violation rather than
    /// stopping at the first, so the stored notes explain the full failure.
    pub fn check(&self, text: &str) -> SafetyVerdict {
        let mut notes = Vec::new();

        if text.trim().is_empty() {
            notes.push("empty response".to_string());
        }

        if text.chars().count() > MAX_RESPONSE_LEN {
            notes.push(format!(
                "response exceeds {MAX_RESPONSE_LEN} characters"
            ));
        }

        if self.link_pattern.is_match(text) {
            notes.push("response contains a link".to_string());
        }

        let mentions = self.mention_pattern.find_iter(text).count();
        if mentions > MAX_MENTIONS {
            notes.push(format!("response mentions {mentions} users"));
        }

        let lowered = text.to_lowercase();
        for term in BLOCKED_TERMS {
            if lowered.contains(term) {
                notes.push(format!("blocked term: {term}"));
                break;
            }
        }

        if is_shouting(text) {
            notes.push("response is mostly uppercase".to_string());
        }

        let passed = notes.is_empty();
        if !passed {
            warn!(violations = notes.len(), "Response failed safety check");
        }
        SafetyVerdict { passed, notes }
    }
}

impl Default for SafetyValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn is_shouting(text: &str) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() < SHOUTING_MIN_LEN {
        return false;
    }
    let upper = letters.iter().filter(|c| c.is_uppercase()).count();
    upper as f64 / letters.len() as f64 > SHOUTING_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_response_passes() {
        let validator = SafetyValidator::new();
        let verdict = validator.check("Thanks so much for watching! More coming soon.");
        assert!(verdict.passed);
        assert!(verdict.notes_summary().is_none());
    }

    #[test]
    fn links_are_rejected() {
        let validator = SafetyValidator::new();
        assert!(!validator.check("Check out https://example.com").passed);
        assert!(!validator.check("visit www.mysite.io for more").passed);
        assert!(!validator.check("go to bit.ly now").passed);
    }

    #[test]
    fn mass_mentions_rejected() {
        let validator = SafetyValidator::new();
        let verdict = validator.check("@a @b @c @d thanks all!");
        assert!(!verdict.passed);
        assert!(verdict.notes[0].contains("mentions 4"));

        // A few mentions are fine
        assert!(validator.check("Thanks @alice and @bob!").passed);
    }

    #[test]
    fn blocked_terms_rejected() {
        let validator = SafetyValidator::new();
        let verdict = validator.check("Well that was a Stupid question");
        assert!(!verdict.passed);
        assert!(verdict.notes_summary().unwrap().contains("blocked term"));
    }

    #[test]
    fn overlong_response_rejected() {
        let validator = SafetyValidator::new();
        let long = "a".repeat(1001);
        assert!(!validator.check(&long).passed);
    }

    #[test]
    fn shouting_rejected() {
        let validator = SafetyValidator::new();
        assert!(!validator.check("THANKS FOR WATCHING EVERYONE").passed);
        // Short exclamations are not shouting
        assert!(validator.check("WOW thanks so much for the support").passed);
        assert!(validator.check("OK!").passed);
    }

    #[test]
    fn empty_response_rejected() {
        let validator = SafetyValidator::new();
        assert!(!validator.check("   ").passed);
    }

    #[test]
    fn multiple_violations_all_noted() {
        let validator = SafetyValidator::new();
        let verdict = validator.check("VISIT WWW.SPAM.COM NOW @a @b @c @d YOU IDIOT");
        assert!(!verdict.passed);
        assert!(verdict.notes.len() >= 3);
    }
}
