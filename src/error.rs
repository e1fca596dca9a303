//! Error types for the comment automation pipeline.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Platform client errors (posting replies, deleting, flagging).
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("Platform request failed: {0}")]
    RequestFailed(String),

    #[error("Platform rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Platform request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Comment {comment_id} not found on platform")]
    CommentNotFound { comment_id: String },

    #[error("Platform authentication failed: {0}")]
    AuthFailed(String),
}

impl PlatformError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed(_) | Self::RateLimited { .. } | Self::Timeout(_)
        )
    }
}

/// AI generation collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    RequestFailed(String),

    #[error("Generation rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Empty response from generator")]
    EmptyResponse,
}

impl GenerationError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed(_) | Self::RateLimited { .. } | Self::Timeout(_)
        )
    }
}

/// Rule validation errors — rejected at save time, never reach the queue.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Rule name must not be empty")]
    EmptyName,

    #[error("Rule must have at least one condition")]
    NoConditions,

    #[error("Invalid pattern in rule condition: {0}")]
    InvalidPattern(String),

    #[error("Keyword condition must list at least one keyword")]
    EmptyKeywords,

    #[error("response_limit_per_run must be at least 1, got {0}")]
    InvalidLimit(u32),
}

/// Pipeline processing errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Dispatch failed for comment {id} after {attempts} attempts: {reason}")]
    DispatchFailed {
        id: Uuid,
        attempts: u32,
        reason: String,
    },

    #[error("Response {id} is not eligible for dispatch: {reason}")]
    NotDispatchable { id: Uuid, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
