//! Queue data model — queued comments and their status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::Classification;

/// Status of a queued comment.
///
/// Transitions are one-directional:
/// `pending → processing → completed | failed | ignored`.
/// There is no automatic path out of `failed` — a separate requeue
/// operation moves it back to `pending` for manual retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    /// Newly ingested, awaiting classification and rule evaluation.
    Pending,
    /// Claimed by a worker — exclusive, at most one worker per entry.
    Processing,
    /// A matching rule's action was carried out, or none was required.
    Completed,
    /// Unrecoverable error during processing; error detail retained.
    Failed,
    /// Rule evaluation decided no action should be taken.
    Ignored,
}

impl CommentStatus {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Ignored => "ignored",
        }
    }
}

impl std::fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "ignored" => Ok(Self::Ignored),
            _ => Err(format!("Unknown comment status: {}", s)),
        }
    }
}

/// A normalized inbound comment, as delivered by the platform collaborator.
///
/// This is the ingestion input; `QueuedComment` is what the store returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    /// Platform-native comment identifier — the idempotency key.
    pub platform_comment_id: String,
    /// Channel the comment belongs to.
    pub channel_id: String,
    /// Video/post the comment was left on.
    pub video_id: String,
    /// Author display name.
    pub author_name: String,
    /// Author handle, if the platform provides one.
    pub author_handle: Option<String>,
    /// Raw comment text.
    pub text: String,
    /// Processing priority — higher is more urgent.
    pub priority: i32,
    /// When the platform says the comment was published.
    pub published_at: DateTime<Utc>,
}

/// One inbound comment awaiting (or done) processing.
#[derive(Debug, Clone)]
pub struct QueuedComment {
    /// Internal queue entry ID.
    pub id: Uuid,
    /// Platform-native comment identifier (unique).
    pub platform_comment_id: String,
    pub channel_id: String,
    pub video_id: String,
    pub author_name: String,
    pub author_handle: Option<String>,
    pub text: String,
    /// Set by the classifier; `None` until classified.
    pub classification: Option<Classification>,
    pub status: CommentStatus,
    pub priority: i32,
    /// Failure detail for operator inspection, set on `failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set when the entry reaches a terminal status.
    pub processed_at: Option<DateTime<Utc>>,
    /// Updated each time a batch run touches this entry; drives the
    /// staleness sweep.
    pub last_batch_processed_at: Option<DateTime<Utc>>,
}

impl QueuedComment {
    /// Whether this entry is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            CommentStatus::Completed | CommentStatus::Failed | CommentStatus::Ignored
        )
    }
}
