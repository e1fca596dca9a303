//! Dispatch — the only module that talks to the platform client.
//!
//! All outbound actions (reply, delete, flag) go through the retry loop
//! here, and every posted reply is recorded in `sent_responses` before the
//! comment can be marked completed. The sent log doubles as the duplicate
//! guard: a comment with a logged response is never replied to again.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, PlatformError};
use crate::platform::PlatformClient;
use crate::queue::QueuedComment;
use crate::response::{ResponseType, SentResponse};
use crate::retry::RetryPolicy;
use crate::store::Database;

enum PlatformAction<'a> {
    Reply { comment_id: &'a str, text: &'a str },
    Delete { comment_id: &'a str },
    Flag { comment_id: &'a str },
}

impl PlatformAction<'_> {
    fn label(&self) -> &'static str {
        match self {
            Self::Reply { .. } => "reply",
            Self::Delete { .. } => "delete",
            Self::Flag { .. } => "flag",
        }
    }
}

/// Executes platform actions with retry and records the outcome.
pub struct Dispatcher {
    db: Arc<dyn Database>,
    platform: Arc<dyn PlatformClient>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        db: Arc<dyn Database>,
        platform: Arc<dyn PlatformClient>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            db,
            platform,
            retry,
        }
    }

    /// Post a reply to `comment` and log it in `sent_responses`.
    ///
    /// Returns `Ok(false)` when a response for this comment was already
    /// sent; the platform is not called again in that case.
    pub async fn dispatch_reply(
        &self,
        comment: &QueuedComment,
        text: &str,
        response_type: ResponseType,
    ) -> Result<bool, PipelineError> {
        if self.db.has_sent_response(comment.id).await? {
            debug!(comment_id = %comment.id, "Response already sent, skipping dispatch");
            return Ok(false);
        }

        self.call_with_retry(
            comment.id,
            PlatformAction::Reply {
                comment_id: &comment.platform_comment_id,
                text,
            },
        )
        .await?;

        let sent = SentResponse::new(
            comment.id,
            &comment.platform_comment_id,
            &comment.channel_id,
            text,
            response_type,
        );
        self.db.insert_sent_response(&sent).await?;

        info!(
            comment_id = %comment.id,
            response_type = response_type.as_str(),
            "Reply dispatched"
        );
        Ok(true)
    }

    /// Delete `comment` on the platform.
    pub async fn delete(&self, comment: &QueuedComment) -> Result<(), PipelineError> {
        self.call_with_retry(
            comment.id,
            PlatformAction::Delete {
                comment_id: &comment.platform_comment_id,
            },
        )
        .await?;
        info!(comment_id = %comment.id, "Comment deleted");
        Ok(())
    }

    /// Flag `comment` for the creator's attention.
    pub async fn flag(&self, comment: &QueuedComment) -> Result<(), PipelineError> {
        self.call_with_retry(
            comment.id,
            PlatformAction::Flag {
                comment_id: &comment.platform_comment_id,
            },
        )
        .await?;
        info!(comment_id = %comment.id, "Comment flagged");
        Ok(())
    }

    /// Dispatch a human-approved response that was parked for review.
    ///
    /// The response must carry an approval and not have been posted yet.
    pub async fn dispatch_approved(&self, response_id: Uuid) -> Result<(), PipelineError> {
        let response = self
            .db
            .get_ai_response(response_id)
            .await?
            .ok_or(PipelineError::NotDispatchable {
                id: response_id,
                reason: "response not found".into(),
            })?;

        if response.approved_at.is_none() {
            return Err(PipelineError::NotDispatchable {
                id: response_id,
                reason: "response is not approved".into(),
            });
        }
        if response.posted_at.is_some() {
            return Err(PipelineError::NotDispatchable {
                id: response_id,
                reason: "response was already posted".into(),
            });
        }
        // Human approval supersedes the automated safety verdict; the gate
        // only blocks *automatic* posting. Still worth a loud log line.
        if !response.is_auto_dispatchable() {
            warn!(
                response_id = %response_id,
                "Posting human-approved response that failed automated safety"
            );
        }

        let comment = self
            .db
            .get_comment(response.comment_id)
            .await?
            .ok_or(PipelineError::NotDispatchable {
                id: response_id,
                reason: "originating comment not found".into(),
            })?;

        let sent = self
            .dispatch_reply(&comment, &response.response_text, ResponseType::Approved)
            .await?;
        if sent {
            self.db.mark_posted(response_id).await?;
        }
        Ok(())
    }

    async fn call_with_retry(
        &self,
        comment_id: Uuid,
        action: PlatformAction<'_>,
    ) -> Result<(), PipelineError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = match &action {
                PlatformAction::Reply { comment_id, text } => {
                    self.platform.post_reply(comment_id, text).await
                }
                PlatformAction::Delete { comment_id } => {
                    self.platform.delete_comment(comment_id).await
                }
                PlatformAction::Flag { comment_id } => {
                    self.platform.flag_comment(comment_id).await
                }
            };

            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() => match self.retry.delay_before_retry(attempt) {
                    Some(delay) => {
                        warn!(
                            %comment_id,
                            action = action.label(),
                            attempt,
                            error = %e,
                            "Platform call failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(dispatch_failed(comment_id, attempt, e)),
                },
                Err(e) => return Err(dispatch_failed(comment_id, attempt, e)),
            }
        }
    }
}

fn dispatch_failed(id: Uuid, attempts: u32, error: PlatformError) -> PipelineError {
    PipelineError::DispatchFailed {
        id,
        attempts,
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::queue::NewComment;
    use crate::response::AiResponse;
    use crate::store::LibSqlBackend;

    /// Platform client that counts calls and fails a configured number of
    /// times per action kind.
    #[derive(Default)]
    struct CountingPlatform {
        replies: AtomicUsize,
        deletes: AtomicUsize,
        flags: AtomicUsize,
        fail_first: usize,
        permanent_failure: bool,
    }

    #[async_trait]
    impl PlatformClient for CountingPlatform {
        async fn post_reply(&self, _comment_id: &str, _text: &str) -> Result<(), PlatformError> {
            let n = self.replies.fetch_add(1, Ordering::SeqCst);
            if self.permanent_failure {
                return Err(PlatformError::AuthFailed("token revoked".into()));
            }
            if n < self.fail_first {
                return Err(PlatformError::RequestFailed("502".into()));
            }
            Ok(())
        }

        async fn delete_comment(&self, _comment_id: &str) -> Result<(), PlatformError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn flag_comment(&self, _comment_id: &str) -> Result<(), PlatformError> {
            self.flags.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn setup(
        platform: CountingPlatform,
    ) -> (Dispatcher, Arc<LibSqlBackend>, QueuedComment) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let id = db
            .ingest_comment(&NewComment {
                platform_comment_id: "yt-1".into(),
                channel_id: "ch-1".into(),
                video_id: "vid-1".into(),
                author_name: "Alice".into(),
                author_handle: None,
                text: "Love it!".into(),
                priority: 0,
                published_at: Utc::now(),
            })
            .await
            .unwrap()
            .unwrap();
        let comment = db.get_comment(id).await.unwrap().unwrap();
        let dispatcher = Dispatcher::new(
            db.clone(),
            Arc::new(platform),
            RetryPolicy::immediate(3),
        );
        (dispatcher, db, comment)
    }

    #[tokio::test]
    async fn successful_reply_is_logged() {
        let (dispatcher, db, comment) = setup(CountingPlatform::default()).await;

        let sent = dispatcher
            .dispatch_reply(&comment, "Thanks!", ResponseType::Automated)
            .await
            .unwrap();
        assert!(sent);

        assert!(db.has_sent_response(comment.id).await.unwrap());
        let log = db.sent_responses_for_channel("ch-1", 10).await.unwrap();
        assert_eq!(log[0].response_text, "Thanks!");
        assert_eq!(log[0].response_type, ResponseType::Automated);
    }

    #[tokio::test]
    async fn duplicate_reply_is_skipped() {
        let platform = CountingPlatform::default();
        let (dispatcher, db, comment) = setup(platform).await;

        assert!(dispatcher
            .dispatch_reply(&comment, "Thanks!", ResponseType::Automated)
            .await
            .unwrap());
        assert!(!dispatcher
            .dispatch_reply(&comment, "Thanks again!", ResponseType::Automated)
            .await
            .unwrap());

        // Only the first reply hit the log
        let log = db.sent_responses_for_channel("ch-1", 10).await.unwrap();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let platform = CountingPlatform {
            fail_first: 2,
            ..Default::default()
        };
        let (dispatcher, _db, comment) = setup(platform).await;

        let sent = dispatcher
            .dispatch_reply(&comment, "Thanks!", ResponseType::Automated)
            .await
            .unwrap();
        assert!(sent);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_with_attempt_count() {
        let platform = CountingPlatform {
            fail_first: 10,
            ..Default::default()
        };
        let (dispatcher, db, comment) = setup(platform).await;

        let result = dispatcher
            .dispatch_reply(&comment, "Thanks!", ResponseType::Automated)
            .await;

        match result {
            Err(PipelineError::DispatchFailed { id, attempts, .. }) => {
                assert_eq!(id, comment.id);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected DispatchFailed, got {other:?}"),
        }

        // Nothing logged on failure
        assert!(!db.has_sent_response(comment.id).await.unwrap());
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let platform = CountingPlatform {
            permanent_failure: true,
            ..Default::default()
        };
        let (dispatcher, _db, comment) = setup(platform).await;

        let result = dispatcher
            .dispatch_reply(&comment, "Thanks!", ResponseType::Automated)
            .await;

        match result {
            Err(PipelineError::DispatchFailed { attempts, .. }) => assert_eq!(attempts, 1),
            other => panic!("expected DispatchFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_and_flag_paths() {
        let (dispatcher, _db, comment) = setup(CountingPlatform::default()).await;
        dispatcher.delete(&comment).await.unwrap();
        dispatcher.flag(&comment).await.unwrap();
    }

    #[tokio::test]
    async fn approved_response_is_posted_and_marked() {
        let (dispatcher, db, comment) = setup(CountingPlatform::default()).await;

        let response = AiResponse::new(comment.id, "Approved reply");
        db.insert_ai_response(&response).await.unwrap();
        db.set_safety_outcome(response.id, true, None).await.unwrap();
        assert!(db.approve_response(response.id).await.unwrap());

        dispatcher.dispatch_approved(response.id).await.unwrap();

        let loaded = db.get_ai_response(response.id).await.unwrap().unwrap();
        assert!(loaded.posted_at.is_some());
        let log = db.sent_responses_for_channel("ch-1", 10).await.unwrap();
        assert_eq!(log[0].response_type, ResponseType::Approved);
    }

    #[tokio::test]
    async fn unapproved_response_is_not_dispatchable() {
        let (dispatcher, db, comment) = setup(CountingPlatform::default()).await;

        let response = AiResponse::new(comment.id, "Parked reply");
        db.insert_ai_response(&response).await.unwrap();
        db.set_safety_outcome(response.id, true, None).await.unwrap();

        let result = dispatcher.dispatch_approved(response.id).await;
        assert!(matches!(
            result,
            Err(PipelineError::NotDispatchable { .. })
        ));
    }

    #[tokio::test]
    async fn human_approval_overrides_failed_safety() {
        let (dispatcher, db, comment) = setup(CountingPlatform::default()).await;

        let response = AiResponse::new(comment.id, "Reviewed reply");
        db.insert_ai_response(&response).await.unwrap();
        db.set_safety_outcome(response.id, false, Some("link")).await.unwrap();
        db.approve_response(response.id).await.unwrap();

        dispatcher.dispatch_approved(response.id).await.unwrap();

        let loaded = db.get_ai_response(response.id).await.unwrap().unwrap();
        assert!(loaded.posted_at.is_some());
    }
}
