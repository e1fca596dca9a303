//! Response data model — cache entries, AI candidates, and the send log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::Classification;

/// A reusable response template keyed by content fingerprint.
#[derive(Debug, Clone)]
pub struct ResponseCacheEntry {
    pub id: Uuid,
    /// Fingerprint of normalized text + classification (unique).
    pub fingerprint: String,
    pub response_template: String,
    pub classification: Classification,
    /// Monotonically increasing; bumped atomically on each hit.
    pub usage_count: i64,
    pub last_used_at: DateTime<Utc>,
    /// Entries past this instant are never served.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ResponseCacheEntry {
    /// Whether the entry has expired as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|e| e <= now)
    }
}

/// A generated candidate reply tied to a queue entry.
///
/// Created by the generator, mutated by the safety validator
/// (`passed_safety`) and the dispatcher (`approved_at`/`posted_at`).
#[derive(Debug, Clone)]
pub struct AiResponse {
    pub id: Uuid,
    pub comment_id: Uuid,
    pub response_text: String,
    pub passed_safety: Option<bool>,
    pub safety_checked_at: Option<DateTime<Utc>>,
    pub safety_notes: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AiResponse {
    /// Create a fresh, unchecked candidate for a queue entry.
    pub fn new(comment_id: Uuid, response_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            comment_id,
            response_text: response_text.into(),
            passed_safety: None,
            safety_checked_at: None,
            safety_notes: None,
            approved_at: None,
            posted_at: None,
            created_at: Utc::now(),
        }
    }

    /// Eligible for automatic dispatch: safety-passed and not yet posted.
    pub fn is_auto_dispatchable(&self) -> bool {
        self.passed_safety == Some(true) && self.posted_at.is_none()
    }
}

/// How a sent response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Posted by the pipeline with no human in the loop.
    Automated,
    /// Parked for review, then approved and posted.
    Approved,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automated => "automated",
            Self::Approved => "approved",
        }
    }
}

impl std::str::FromStr for ResponseType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "automated" => Ok(Self::Automated),
            "approved" => Ok(Self::Approved),
            _ => Err(format!("Unknown response type: {}", s)),
        }
    }
}

/// Durable log of every reply actually transmitted.
///
/// Independent of the queue; used for analytics and duplicate-send
/// prevention.
#[derive(Debug, Clone)]
pub struct SentResponse {
    pub id: Uuid,
    pub comment_id: Uuid,
    pub platform_comment_id: String,
    pub channel_id: String,
    pub response_text: String,
    pub response_type: ResponseType,
    pub sent_at: DateTime<Utc>,
}

impl SentResponse {
    pub fn new(
        comment_id: Uuid,
        platform_comment_id: impl Into<String>,
        channel_id: impl Into<String>,
        response_text: impl Into<String>,
        response_type: ResponseType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            comment_id,
            platform_comment_id: platform_comment_id.into(),
            channel_id: channel_id.into(),
            response_text: response_text.into(),
            response_type,
            sent_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_entry_expiry() {
        let now = Utc::now();
        let mut entry = ResponseCacheEntry {
            id: Uuid::new_v4(),
            fingerprint: "fp".into(),
            response_template: "thanks!".into(),
            classification: Classification::SimplePositive,
            usage_count: 0,
            last_used_at: now,
            expires_at: None,
            created_at: now,
        };
        assert!(!entry.is_expired_at(now));

        entry.expires_at = Some(now - chrono::Duration::seconds(1));
        assert!(entry.is_expired_at(now));

        entry.expires_at = Some(now + chrono::Duration::hours(1));
        assert!(!entry.is_expired_at(now));
    }

    #[test]
    fn ai_response_dispatchability() {
        let mut resp = AiResponse::new(Uuid::new_v4(), "hello");
        assert!(!resp.is_auto_dispatchable());

        resp.passed_safety = Some(true);
        assert!(resp.is_auto_dispatchable());

        resp.posted_at = Some(Utc::now());
        assert!(!resp.is_auto_dispatchable());

        let mut failed = AiResponse::new(Uuid::new_v4(), "hmm");
        failed.passed_safety = Some(false);
        assert!(!failed.is_auto_dispatchable());
    }

    #[test]
    fn response_type_roundtrips() {
        for t in [ResponseType::Automated, ResponseType::Approved] {
            assert_eq!(t.as_str().parse::<ResponseType>().unwrap(), t);
        }
    }
}
