//! Unified `Database` trait — single async interface for all persistence.
//!
//! Every state transition is a single statement on the backend so workers
//! coordinating through the store never race on read-then-write pairs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::classify::Classification;
use crate::error::DatabaseError;
use crate::queue::{NewComment, QueuedComment};
use crate::response::{AiResponse, ResponseCacheEntry, SentResponse};
use crate::rules::{AutomationRule, RuleExecution};

/// Backend-agnostic database trait covering the whole pipeline.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Comment queue ───────────────────────────────────────────────

    /// Idempotent ingest keyed on `platform_comment_id`.
    ///
    /// Returns `Some(id)` when a new row was inserted, `None` when the
    /// comment was already queued (success, not an error).
    async fn ingest_comment(&self, comment: &NewComment)
        -> Result<Option<Uuid>, DatabaseError>;

    /// Get a queue entry by internal ID.
    async fn get_comment(&self, id: Uuid) -> Result<Option<QueuedComment>, DatabaseError>;

    /// Look up a queue entry by its platform-native ID.
    async fn get_comment_by_platform_id(
        &self,
        platform_comment_id: &str,
    ) -> Result<Option<QueuedComment>, DatabaseError>;

    /// Atomically claim a pending entry for processing.
    ///
    /// Single conditional UPDATE (`WHERE status='pending'`); returns whether
    /// this caller won the claim. At most one concurrent caller can.
    async fn claim_comment(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Pending entries, highest priority first, then oldest first.
    async fn pending_comments(&self, limit: usize)
        -> Result<Vec<QueuedComment>, DatabaseError>;

    /// Record the classifier's label for an entry.
    async fn set_classification(
        &self,
        id: Uuid,
        classification: Classification,
    ) -> Result<(), DatabaseError>;

    /// Transition a processing entry to `completed`.
    async fn complete_comment(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Transition a processing entry to `ignored`.
    async fn ignore_comment(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Transition an entry to `failed`, retaining the error detail.
    async fn fail_comment(&self, id: Uuid, error: &str) -> Result<(), DatabaseError>;

    /// Explicit re-queue: move a `failed` entry back to `pending`.
    /// Returns whether the entry was in `failed` and got re-queued.
    async fn requeue_comment(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Reset `processing` rows last touched before `cutoff` back to
    /// `pending`. Recovery for workers that died mid-claim; returns the
    /// number of rows reset.
    async fn reset_stale_processing(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, DatabaseError>;

    /// Pending rows created before `cutoff` and not touched by any batch
    /// since — candidates for a sweep/retry job.
    async fn stale_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueuedComment>, DatabaseError>;

    // ── Automation rules ────────────────────────────────────────────

    /// Insert a rule. Callers validate with `AutomationRule::validate`
    /// before saving.
    async fn insert_rule(&self, rule: &AutomationRule) -> Result<(), DatabaseError>;

    /// All rules for a channel, priority descending then oldest first.
    async fn rules_for_channel(
        &self,
        channel_id: &str,
    ) -> Result<Vec<AutomationRule>, DatabaseError>;

    /// Enable or disable a rule.
    async fn set_rule_enabled(&self, id: Uuid, enabled: bool) -> Result<(), DatabaseError>;

    /// Delete a rule. Execution records keep their audit rows with
    /// `rule_id` nulled.
    async fn delete_rule(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Append an immutable execution record.
    async fn insert_rule_execution(
        &self,
        execution: &RuleExecution,
    ) -> Result<(), DatabaseError>;

    /// Execution records for a comment, oldest first.
    async fn rule_executions_for_comment(
        &self,
        comment_id: Uuid,
    ) -> Result<Vec<RuleExecution>, DatabaseError>;

    // ── Response cache ──────────────────────────────────────────────

    /// Look up a cache entry by fingerprint. Expired entries are never
    /// returned.
    async fn cache_lookup(
        &self,
        fingerprint: &str,
    ) -> Result<Option<ResponseCacheEntry>, DatabaseError>;

    /// Record a cache hit: atomic `usage_count = usage_count + 1` plus
    /// `last_used_at` bump.
    async fn cache_touch(&self, fingerprint: &str) -> Result<(), DatabaseError>;

    /// Store a cache entry. A duplicate fingerprint is an idempotent no-op.
    async fn cache_store(&self, entry: &ResponseCacheEntry) -> Result<(), DatabaseError>;

    /// Delete entries past their `expires_at`. Returns the number removed.
    async fn prune_expired_cache(&self) -> Result<usize, DatabaseError>;

    // ── AI responses ────────────────────────────────────────────────

    /// Persist a generated candidate reply.
    async fn insert_ai_response(&self, response: &AiResponse) -> Result<(), DatabaseError>;

    /// Get a candidate by ID.
    async fn get_ai_response(&self, id: Uuid) -> Result<Option<AiResponse>, DatabaseError>;

    /// Record the safety verdict on a candidate.
    async fn set_safety_outcome(
        &self,
        id: Uuid,
        passed: bool,
        notes: Option<&str>,
    ) -> Result<(), DatabaseError>;

    /// Human approval of a parked candidate. Returns whether the candidate
    /// existed and was not already approved or posted.
    async fn approve_response(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Mark a candidate as posted.
    async fn mark_posted(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Candidates parked for human review (not approved, not posted).
    async fn responses_awaiting_approval(&self) -> Result<Vec<AiResponse>, DatabaseError>;

    // ── Sent responses ──────────────────────────────────────────────

    /// Append to the durable send log.
    async fn insert_sent_response(
        &self,
        sent: &SentResponse,
    ) -> Result<(), DatabaseError>;

    /// Whether any reply has already been transmitted for this queue entry.
    async fn has_sent_response(&self, comment_id: Uuid) -> Result<bool, DatabaseError>;

    /// Send log for a channel, most recent first.
    async fn sent_responses_for_channel(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<SentResponse>, DatabaseError>;
}
