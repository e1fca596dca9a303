//! Comment classifier — deterministic regex heuristics, no LLM.
//!
//! Assigns a `Classification` label to each queued comment. The label drives
//! both rule matching and template selection, and is part of the response
//! cache fingerprint, so classification must be pure and stable.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Intent/sentiment label for an inbound comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Short praise with no question ("Love this!", "🔥🔥").
    SimplePositive,
    /// Asks something — needs a substantive answer.
    Question,
    /// Hostile or critical content.
    Negative,
    /// Link spam, scam bait, self-promotion.
    Spam,
    /// Everything else.
    General,
}

impl Classification {
    /// Stable string form used in the database and the fingerprint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimplePositive => "simple_positive",
            Self::Question => "question",
            Self::Negative => "negative",
            Self::Spam => "spam",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Classification {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple_positive" => Ok(Self::SimplePositive),
            "question" => Ok(Self::Question),
            "negative" => Ok(Self::Negative),
            "spam" => Ok(Self::Spam),
            "general" => Ok(Self::General),
            _ => Err(format!("Unknown classification: {}", s)),
        }
    }
}

/// Regex-based comment classifier.
pub struct Classifier {
    spam: Vec<Regex>,
    negative: Vec<Regex>,
    positive: Vec<Regex>,
}

impl Classifier {
    /// Create a classifier with the default heuristics.
    pub fn new() -> Self {
        let spam = vec![
            Regex::new(r"(?i)https?://").unwrap(),
            Regex::new(r"(?i)\b(check out my|sub4sub|follow me|free (gift|crypto|money))\b")
                .unwrap(),
            Regex::new(r"(?i)\b(telegram|whats ?app) me\b").unwrap(),
        ];
        let negative = vec![
            Regex::new(r"(?i)\b(hate|terrible|awful|worst|trash|garbage|clickbait|scam)\b")
                .unwrap(),
            Regex::new(r"(?i)\b(unsubscrib(e|ed|ing)|dislike[d]?|boring|waste of time)\b").unwrap(),
        ];
        let positive = vec![
            Regex::new(r"(?i)\b(love|great|awesome|amazing|nice|perfect|best|beautiful)\b")
                .unwrap(),
            Regex::new(r"(?i)\b(thank(s| you)|keep it up|well done|subscribed)\b").unwrap(),
            Regex::new(r"[🔥❤️😍👏🙌💯]").unwrap(),
        ];
        Self {
            spam,
            negative,
            positive,
        }
    }

    /// Classify a comment's text.
    ///
    /// Precedence: spam > question > negative > simple_positive > general.
    /// Spam wins so link droppers with flattering text don't get templated
    /// thank-yous; a question mark beats sentiment because questions need
    /// real answers.
    pub fn classify(&self, text: &str) -> Classification {
        if self.spam.iter().any(|r| r.is_match(text)) {
            return Classification::Spam;
        }
        if text.contains('?') {
            return Classification::Question;
        }
        if self.negative.iter().any(|r| r.is_match(text)) {
            return Classification::Negative;
        }
        if self.positive.iter().any(|r| r.is_match(text)) {
            return Classification::SimplePositive;
        }
        Classification::General
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_simple_positive() {
        let c = Classifier::new();
        assert_eq!(
            c.classify("Love this video!"),
            Classification::SimplePositive
        );
        assert_eq!(c.classify("🔥🔥🔥"), Classification::SimplePositive);
    }

    #[test]
    fn classifies_question() {
        let c = Classifier::new();
        assert_eq!(
            c.classify("What camera do you use?"),
            Classification::Question
        );
    }

    #[test]
    fn classifies_negative() {
        let c = Classifier::new();
        assert_eq!(
            c.classify("this is trash, unsubscribed"),
            Classification::Negative
        );
    }

    #[test]
    fn classifies_spam() {
        let c = Classifier::new();
        assert_eq!(
            c.classify("great vid! check out my channel https://spam.example"),
            Classification::Spam
        );
    }

    #[test]
    fn spam_beats_positive() {
        let c = Classifier::new();
        assert_eq!(
            c.classify("Love it! free crypto at my page"),
            Classification::Spam
        );
    }

    #[test]
    fn question_beats_sentiment() {
        let c = Classifier::new();
        assert_eq!(
            c.classify("Love the video — what mic is that?"),
            Classification::Question
        );
    }

    #[test]
    fn falls_back_to_general() {
        let c = Classifier::new();
        assert_eq!(c.classify("I watched this at 2am"), Classification::General);
    }

    #[test]
    fn classification_roundtrips_through_str() {
        for c in [
            Classification::SimplePositive,
            Classification::Question,
            Classification::Negative,
            Classification::Spam,
            Classification::General,
        ] {
            assert_eq!(c.as_str().parse::<Classification>().unwrap(), c);
        }
    }

    #[test]
    fn classification_is_deterministic() {
        let c = Classifier::new();
        let text = "Love the editing, keep it up";
        assert_eq!(c.classify(text), c.classify(text));
    }
}
