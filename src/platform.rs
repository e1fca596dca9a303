//! External collaborator seams — platform and AI generation clients.
//!
//! Pure I/O traits, no business logic. Real implementations (YouTube API,
//! Claude, ...) live outside this crate; the binary ships log-only dry-run
//! versions and tests use recording mocks.

use async_trait::async_trait;
use tracing::info;

use crate::error::{GenerationError, PlatformError};

/// Channel/video context handed to the AI generation collaborator.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    pub channel_id: String,
    pub video_id: String,
    pub channel_name: Option<String>,
    pub video_title: Option<String>,
    /// Creator-configured tone/style guidance.
    pub style_notes: Option<String>,
}

/// Platform moderation/reply client.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Post a reply to a platform comment.
    async fn post_reply(&self, comment_id: &str, text: &str) -> Result<(), PlatformError>;

    /// Delete a platform comment.
    async fn delete_comment(&self, comment_id: &str) -> Result<(), PlatformError>;

    /// Flag a platform comment for the creator's attention.
    async fn flag_comment(&self, comment_id: &str) -> Result<(), PlatformError>;
}

/// AI reply generation client.
#[async_trait]
pub trait AiClient: Send + Sync {
    /// Generate a candidate reply to a comment.
    async fn generate(
        &self,
        comment_text: &str,
        context: &GenerationContext,
    ) -> Result<String, GenerationError>;
}

/// Log-only platform client for local/dry runs — never touches a platform.
pub struct DryRunPlatformClient;

#[async_trait]
impl PlatformClient for DryRunPlatformClient {
    async fn post_reply(&self, comment_id: &str, text: &str) -> Result<(), PlatformError> {
        info!(comment_id, text, "[dry-run] would post reply");
        Ok(())
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<(), PlatformError> {
        info!(comment_id, "[dry-run] would delete comment");
        Ok(())
    }

    async fn flag_comment(&self, comment_id: &str) -> Result<(), PlatformError> {
        info!(comment_id, "[dry-run] would flag comment");
        Ok(())
    }
}

/// Log-only AI client for local/dry runs — echoes a canned acknowledgement.
pub struct DryRunAiClient;

#[async_trait]
impl AiClient for DryRunAiClient {
    async fn generate(
        &self,
        comment_text: &str,
        context: &GenerationContext,
    ) -> Result<String, GenerationError> {
        info!(
            channel_id = %context.channel_id,
            video_id = %context.video_id,
            comment_text,
            "[dry-run] would call AI generator"
        );
        Ok("Thanks for watching and taking the time to comment!".to_string())
    }
}
