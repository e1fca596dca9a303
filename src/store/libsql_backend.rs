//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Every state transition is
//! one conditional statement so concurrent workers coordinating through the
//! store cannot observe half-applied transitions.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::classify::Classification;
use crate::error::DatabaseError;
use crate::queue::{CommentStatus, NewComment, QueuedComment};
use crate::response::{AiResponse, ResponseCacheEntry, ResponseType, SentResponse};
use crate::rules::{AutomationRule, ExecutedAction, RuleExecution};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(backend.conn()).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(backend.conn()).await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn query_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

/// Map a libsql Row to a QueuedComment.
///
/// Column order: 0:id, 1:platform_comment_id, 2:channel_id, 3:video_id,
/// 4:author_name, 5:author_handle, 6:text, 7:classification, 8:status,
/// 9:priority, 10:error, 11:created_at, 12:processed_at,
/// 13:last_batch_processed_at
fn row_to_comment(row: &libsql::Row) -> Result<QueuedComment, DatabaseError> {
    let id_str: String = row.get(0).map_err(query_err)?;
    let classification_str: Option<String> = row.get(7).ok();
    let status_str: String = row.get(8).map_err(query_err)?;
    let created_str: String = row.get(11).map_err(query_err)?;
    let processed_str: Option<String> = row.get(12).ok();
    let batch_str: Option<String> = row.get(13).ok();

    Ok(QueuedComment {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("Bad comment id: {e}")))?,
        platform_comment_id: row.get(1).map_err(query_err)?,
        channel_id: row.get(2).map_err(query_err)?,
        video_id: row.get(3).map_err(query_err)?,
        author_name: row.get(4).map_err(query_err)?,
        author_handle: row.get(5).ok(),
        text: row.get(6).map_err(query_err)?,
        classification: classification_str.and_then(|s| s.parse::<Classification>().ok()),
        status: status_str
            .parse::<CommentStatus>()
            .map_err(DatabaseError::Serialization)?,
        priority: row.get::<i64>(9).map_err(query_err)? as i32,
        error: row.get(10).ok(),
        created_at: parse_datetime(&created_str),
        processed_at: parse_optional_datetime(&processed_str),
        last_batch_processed_at: parse_optional_datetime(&batch_str),
    })
}

const COMMENT_COLUMNS: &str = "id, platform_comment_id, channel_id, video_id, author_name, \
     author_handle, text, classification, status, priority, error, created_at, \
     processed_at, last_batch_processed_at";

/// Map a libsql Row to an AutomationRule.
///
/// Column order: 0:id, 1:channel_id, 2:name, 3:enabled, 4:priority,
/// 5:conditions, 6:action, 7:response_limit_per_run, 8:require_approval,
/// 9:variant, 10:intelligence, 11:created_at, 12:updated_at
fn row_to_rule(row: &libsql::Row) -> Result<AutomationRule, DatabaseError> {
    let id_str: String = row.get(0).map_err(query_err)?;
    let conditions_str: String = row.get(5).map_err(query_err)?;
    let action_str: String = row.get(6).map_err(query_err)?;
    let intelligence_str: Option<String> = row.get(10).ok();
    let created_str: String = row.get(11).map_err(query_err)?;
    let updated_str: String = row.get(12).map_err(query_err)?;

    Ok(AutomationRule {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("Bad rule id: {e}")))?,
        channel_id: row.get(1).map_err(query_err)?,
        name: row.get(2).map_err(query_err)?,
        enabled: row.get::<i64>(3).map_err(query_err)? != 0,
        priority: row.get::<i64>(4).map_err(query_err)? as i32,
        conditions: serde_json::from_str(&conditions_str)
            .map_err(|e| DatabaseError::Serialization(format!("Bad rule conditions: {e}")))?,
        action: serde_json::from_str(&action_str)
            .map_err(|e| DatabaseError::Serialization(format!("Bad rule action: {e}")))?,
        response_limit_per_run: row.get::<i64>(7).map_err(query_err)? as u32,
        require_approval: row.get::<i64>(8).map_err(query_err)? != 0,
        variant: row.get(9).ok(),
        intelligence: intelligence_str.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to a RuleExecution.
fn row_to_execution(row: &libsql::Row) -> Result<RuleExecution, DatabaseError> {
    let id_str: String = row.get(0).map_err(query_err)?;
    let rule_id_str: Option<String> = row.get(1).ok();
    let comment_id_str: String = row.get(2).map_err(query_err)?;
    let matched_str: String = row.get(4).map_err(query_err)?;
    let action_str: String = row.get(5).map_err(query_err)?;
    let context_str: Option<String> = row.get(7).ok();
    let created_str: String = row.get(9).map_err(query_err)?;

    Ok(RuleExecution {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("Bad execution id: {e}")))?,
        rule_id: rule_id_str.and_then(|s| Uuid::parse_str(&s).ok()),
        comment_id: Uuid::parse_str(&comment_id_str)
            .map_err(|e| DatabaseError::Serialization(format!("Bad comment id: {e}")))?,
        video_id: row.get(3).map_err(query_err)?,
        matched_conditions: serde_json::from_str(&matched_str)
            .unwrap_or(serde_json::Value::Null),
        action: action_str
            .parse::<ExecutedAction>()
            .map_err(DatabaseError::Serialization)?,
        variant: row.get(6).ok(),
        user_context: context_str.and_then(|s| serde_json::from_str(&s).ok()),
        duration_ms: row.get(8).map_err(query_err)?,
        created_at: parse_datetime(&created_str),
    })
}

/// Map a libsql Row to a ResponseCacheEntry.
fn row_to_cache_entry(row: &libsql::Row) -> Result<ResponseCacheEntry, DatabaseError> {
    let id_str: String = row.get(0).map_err(query_err)?;
    let classification_str: String = row.get(3).map_err(query_err)?;
    let last_used_str: String = row.get(5).map_err(query_err)?;
    let expires_str: Option<String> = row.get(6).ok();
    let created_str: String = row.get(7).map_err(query_err)?;

    Ok(ResponseCacheEntry {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("Bad cache id: {e}")))?,
        fingerprint: row.get(1).map_err(query_err)?,
        response_template: row.get(2).map_err(query_err)?,
        classification: classification_str
            .parse::<Classification>()
            .map_err(DatabaseError::Serialization)?,
        usage_count: row.get(4).map_err(query_err)?,
        last_used_at: parse_datetime(&last_used_str),
        expires_at: parse_optional_datetime(&expires_str),
        created_at: parse_datetime(&created_str),
    })
}

/// Map a libsql Row to an AiResponse.
fn row_to_ai_response(row: &libsql::Row) -> Result<AiResponse, DatabaseError> {
    let id_str: String = row.get(0).map_err(query_err)?;
    let comment_id_str: String = row.get(1).map_err(query_err)?;
    let passed: Option<i64> = row.get(3).ok();
    let checked_str: Option<String> = row.get(4).ok();
    let approved_str: Option<String> = row.get(6).ok();
    let posted_str: Option<String> = row.get(7).ok();
    let created_str: String = row.get(8).map_err(query_err)?;

    Ok(AiResponse {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("Bad response id: {e}")))?,
        comment_id: Uuid::parse_str(&comment_id_str)
            .map_err(|e| DatabaseError::Serialization(format!("Bad comment id: {e}")))?,
        response_text: row.get(2).map_err(query_err)?,
        passed_safety: passed.map(|v| v != 0),
        safety_checked_at: parse_optional_datetime(&checked_str),
        safety_notes: row.get(5).ok(),
        approved_at: parse_optional_datetime(&approved_str),
        posted_at: parse_optional_datetime(&posted_str),
        created_at: parse_datetime(&created_str),
    })
}

const AI_RESPONSE_COLUMNS: &str = "id, comment_id, response_text, passed_safety, \
     safety_checked_at, safety_notes, approved_at, posted_at, created_at";

/// Map a libsql Row to a SentResponse.
fn row_to_sent(row: &libsql::Row) -> Result<SentResponse, DatabaseError> {
    let id_str: String = row.get(0).map_err(query_err)?;
    let comment_id_str: String = row.get(1).map_err(query_err)?;
    let type_str: String = row.get(5).map_err(query_err)?;
    let sent_str: String = row.get(6).map_err(query_err)?;

    Ok(SentResponse {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("Bad sent id: {e}")))?,
        comment_id: Uuid::parse_str(&comment_id_str)
            .map_err(|e| DatabaseError::Serialization(format!("Bad comment id: {e}")))?,
        platform_comment_id: row.get(2).map_err(query_err)?,
        channel_id: row.get(3).map_err(query_err)?,
        response_text: row.get(4).map_err(query_err)?,
        response_type: type_str
            .parse::<ResponseType>()
            .map_err(DatabaseError::Serialization)?,
        sent_at: parse_datetime(&sent_str),
    })
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Comment queue ───────────────────────────────────────────────

    async fn ingest_comment(
        &self,
        comment: &NewComment,
    ) -> Result<Option<Uuid>, DatabaseError> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        // ON CONFLICT DO NOTHING makes re-ingestion of an already-queued
        // comment a no-op: zero rows changed, no error.
        let affected = self
            .conn()
            .execute(
                "INSERT INTO comments (id, platform_comment_id, channel_id, video_id, \
                 author_name, author_handle, text, status, priority, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9) \
                 ON CONFLICT(platform_comment_id) DO NOTHING",
                params![
                    id.to_string(),
                    comment.platform_comment_id.as_str(),
                    comment.channel_id.as_str(),
                    comment.video_id.as_str(),
                    comment.author_name.as_str(),
                    comment.author_handle.as_deref(),
                    comment.text.as_str(),
                    comment.priority as i64,
                    now,
                ],
            )
            .await
            .map_err(query_err)?;

        Ok((affected > 0).then_some(id))
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<QueuedComment>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_comment(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_comment_by_platform_id(
        &self,
        platform_comment_id: &str,
    ) -> Result<Option<QueuedComment>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {COMMENT_COLUMNS} FROM comments WHERE platform_comment_id = ?1"
                ),
                params![platform_comment_id],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_comment(&row)?)),
            None => Ok(None),
        }
    }

    async fn claim_comment(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn()
            .execute(
                "UPDATE comments SET status = 'processing', last_batch_processed_at = ?2 \
                 WHERE id = ?1 AND status = 'pending'",
                params![id.to_string(), now],
            )
            .await
            .map_err(query_err)?;
        Ok(affected == 1)
    }

    async fn pending_comments(
        &self,
        limit: usize,
    ) -> Result<Vec<QueuedComment>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {COMMENT_COLUMNS} FROM comments WHERE status = 'pending' \
                     ORDER BY priority DESC, created_at ASC LIMIT ?1"
                ),
                params![limit as i64],
            )
            .await
            .map_err(query_err)?;

        let mut comments = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            comments.push(row_to_comment(&row)?);
        }
        Ok(comments)
    }

    async fn set_classification(
        &self,
        id: Uuid,
        classification: Classification,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE comments SET classification = ?2 WHERE id = ?1",
                params![id.to_string(), classification.as_str()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn complete_comment(&self, id: Uuid) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE comments SET status = 'completed', processed_at = ?2 \
                 WHERE id = ?1 AND status = 'processing'",
                params![id.to_string(), now],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn ignore_comment(&self, id: Uuid) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE comments SET status = 'ignored', processed_at = ?2 \
                 WHERE id = ?1 AND status = 'processing'",
                params![id.to_string(), now],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn fail_comment(&self, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE comments SET status = 'failed', error = ?2, processed_at = ?3 \
                 WHERE id = ?1",
                params![id.to_string(), error, now],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn requeue_comment(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE comments SET status = 'pending', error = NULL, processed_at = NULL \
                 WHERE id = ?1 AND status = 'failed'",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        Ok(affected == 1)
    }

    async fn reset_stale_processing(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE comments SET status = 'pending' \
                 WHERE status = 'processing' AND last_batch_processed_at < ?1",
                params![cutoff.to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(affected as usize)
    }

    async fn stale_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueuedComment>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {COMMENT_COLUMNS} FROM comments WHERE status = 'pending' \
                     AND created_at < ?1 \
                     AND (last_batch_processed_at IS NULL OR last_batch_processed_at < ?1) \
                     ORDER BY created_at ASC LIMIT ?2"
                ),
                params![cutoff.to_rfc3339(), limit as i64],
            )
            .await
            .map_err(query_err)?;

        let mut comments = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            comments.push(row_to_comment(&row)?);
        }
        Ok(comments)
    }

    // ── Automation rules ────────────────────────────────────────────

    async fn insert_rule(&self, rule: &AutomationRule) -> Result<(), DatabaseError> {
        let conditions = serde_json::to_string(&rule.conditions)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let action = serde_json::to_string(&rule.action)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let intelligence = rule
            .intelligence
            .as_ref()
            .map(|v| v.to_string());

        self.conn()
            .execute(
                "INSERT INTO automation_rules (id, channel_id, name, enabled, priority, \
                 conditions, action, response_limit_per_run, require_approval, variant, \
                 intelligence, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    rule.id.to_string(),
                    rule.channel_id.as_str(),
                    rule.name.as_str(),
                    rule.enabled as i64,
                    rule.priority as i64,
                    conditions,
                    action,
                    rule.response_limit_per_run as i64,
                    rule.require_approval as i64,
                    rule.variant.as_deref(),
                    intelligence,
                    rule.created_at.to_rfc3339(),
                    rule.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn rules_for_channel(
        &self,
        channel_id: &str,
    ) -> Result<Vec<AutomationRule>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, channel_id, name, enabled, priority, conditions, action, \
                 response_limit_per_run, require_approval, variant, intelligence, \
                 created_at, updated_at \
                 FROM automation_rules WHERE channel_id = ?1 \
                 ORDER BY priority DESC, created_at ASC",
                params![channel_id],
            )
            .await
            .map_err(query_err)?;

        let mut rules = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            rules.push(row_to_rule(&row)?);
        }
        Ok(rules)
    }

    async fn set_rule_enabled(&self, id: Uuid, enabled: bool) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE automation_rules SET enabled = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), enabled as i64, now],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn delete_rule(&self, id: Uuid) -> Result<(), DatabaseError> {
        // Null the audit references first — SQLite only enforces the
        // ON DELETE SET NULL clause when foreign keys are enabled.
        self.conn()
            .execute(
                "UPDATE rule_executions SET rule_id = NULL WHERE rule_id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        self.conn()
            .execute(
                "DELETE FROM automation_rules WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn insert_rule_execution(
        &self,
        execution: &RuleExecution,
    ) -> Result<(), DatabaseError> {
        let user_context = execution.user_context.as_ref().map(|v| v.to_string());

        self.conn()
            .execute(
                "INSERT INTO rule_executions (id, rule_id, comment_id, video_id, \
                 matched_conditions, action, variant, user_context, duration_ms, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    execution.id.to_string(),
                    execution.rule_id.map(|r| r.to_string()),
                    execution.comment_id.to_string(),
                    execution.video_id.as_str(),
                    execution.matched_conditions.to_string(),
                    execution.action.as_str(),
                    execution.variant.as_deref(),
                    user_context,
                    execution.duration_ms,
                    execution.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn rule_executions_for_comment(
        &self,
        comment_id: Uuid,
    ) -> Result<Vec<RuleExecution>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, rule_id, comment_id, video_id, matched_conditions, action, \
                 variant, user_context, duration_ms, created_at \
                 FROM rule_executions WHERE comment_id = ?1 ORDER BY created_at ASC",
                params![comment_id.to_string()],
            )
            .await
            .map_err(query_err)?;

        let mut executions = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            executions.push(row_to_execution(&row)?);
        }
        Ok(executions)
    }

    // ── Response cache ──────────────────────────────────────────────

    async fn cache_lookup(
        &self,
        fingerprint: &str,
    ) -> Result<Option<ResponseCacheEntry>, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let mut rows = self
            .conn()
            .query(
                "SELECT id, fingerprint, response_template, classification, usage_count, \
                 last_used_at, expires_at, created_at \
                 FROM response_cache WHERE fingerprint = ?1 \
                 AND (expires_at IS NULL OR expires_at > ?2)",
                params![fingerprint, now],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_cache_entry(&row)?)),
            None => Ok(None),
        }
    }

    async fn cache_touch(&self, fingerprint: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE response_cache SET usage_count = usage_count + 1, last_used_at = ?2 \
                 WHERE fingerprint = ?1",
                params![fingerprint, now],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn cache_store(&self, entry: &ResponseCacheEntry) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO response_cache (id, fingerprint, response_template, \
                 classification, usage_count, last_used_at, expires_at, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                 ON CONFLICT(fingerprint) DO NOTHING",
                params![
                    entry.id.to_string(),
                    entry.fingerprint.as_str(),
                    entry.response_template.as_str(),
                    entry.classification.as_str(),
                    entry.usage_count,
                    entry.last_used_at.to_rfc3339(),
                    entry.expires_at.map(|e| e.to_rfc3339()),
                    entry.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn prune_expired_cache(&self) -> Result<usize, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn()
            .execute(
                "DELETE FROM response_cache WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![now],
            )
            .await
            .map_err(query_err)?;
        Ok(affected as usize)
    }

    // ── AI responses ────────────────────────────────────────────────

    async fn insert_ai_response(&self, response: &AiResponse) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO ai_responses (id, comment_id, response_text, passed_safety, \
                 safety_checked_at, safety_notes, approved_at, posted_at, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    response.id.to_string(),
                    response.comment_id.to_string(),
                    response.response_text.as_str(),
                    response.passed_safety.map(|p| p as i64),
                    response.safety_checked_at.map(|t| t.to_rfc3339()),
                    response.safety_notes.as_deref(),
                    response.approved_at.map(|t| t.to_rfc3339()),
                    response.posted_at.map(|t| t.to_rfc3339()),
                    response.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_ai_response(&self, id: Uuid) -> Result<Option<AiResponse>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {AI_RESPONSE_COLUMNS} FROM ai_responses WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_ai_response(&row)?)),
            None => Ok(None),
        }
    }

    async fn set_safety_outcome(
        &self,
        id: Uuid,
        passed: bool,
        notes: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE ai_responses SET passed_safety = ?2, safety_checked_at = ?3, \
                 safety_notes = ?4 WHERE id = ?1",
                params![id.to_string(), passed as i64, now, notes],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn approve_response(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn()
            .execute(
                "UPDATE ai_responses SET approved_at = ?2 \
                 WHERE id = ?1 AND approved_at IS NULL AND posted_at IS NULL",
                params![id.to_string(), now],
            )
            .await
            .map_err(query_err)?;
        Ok(affected == 1)
    }

    async fn mark_posted(&self, id: Uuid) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE ai_responses SET posted_at = ?2 WHERE id = ?1",
                params![id.to_string(), now],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn responses_awaiting_approval(&self) -> Result<Vec<AiResponse>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {AI_RESPONSE_COLUMNS} FROM ai_responses \
                     WHERE approved_at IS NULL AND posted_at IS NULL \
                     ORDER BY created_at ASC"
                ),
                (),
            )
            .await
            .map_err(query_err)?;

        let mut responses = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            responses.push(row_to_ai_response(&row)?);
        }
        Ok(responses)
    }

    // ── Sent responses ──────────────────────────────────────────────

    async fn insert_sent_response(&self, sent: &SentResponse) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO sent_responses (id, comment_id, platform_comment_id, \
                 channel_id, response_text, response_type, sent_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    sent.id.to_string(),
                    sent.comment_id.to_string(),
                    sent.platform_comment_id.as_str(),
                    sent.channel_id.as_str(),
                    sent.response_text.as_str(),
                    sent.response_type.as_str(),
                    sent.sent_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn has_sent_response(&self, comment_id: Uuid) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM sent_responses WHERE comment_id = ?1",
                params![comment_id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => {
                let count: i64 = row.get(0).map_err(query_err)?;
                Ok(count > 0)
            }
            None => Ok(false),
        }
    }

    async fn sent_responses_for_channel(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<SentResponse>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, comment_id, platform_comment_id, channel_id, response_text, \
                 response_type, sent_at \
                 FROM sent_responses WHERE channel_id = ?1 \
                 ORDER BY sent_at DESC LIMIT ?2",
                params![channel_id, limit as i64],
            )
            .await
            .map_err(query_err)?;

        let mut sent = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            sent.push(row_to_sent(&row)?);
        }
        Ok(sent)
    }
}
