//! Staleness sweep — the background janitor for the queue and cache.
//!
//! A crashed worker leaves comments stuck in `processing`; the sweep resets
//! them to `pending` once they pass the staleness threshold so the next
//! batch picks them up. It also surfaces long-waiting pending comments and
//! prunes expired cache rows.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::DatabaseError;
use crate::store::Database;

/// Result of one sweep pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    /// `processing` rows reset to `pending`.
    pub reset_processing: usize,
    /// `pending` rows waiting past the staleness threshold.
    pub stale_pending: usize,
    /// Expired cache rows removed.
    pub pruned_cache: usize,
}

/// Run one sweep pass over the store.
pub async fn run_sweep(
    db: &dyn Database,
    config: &PipelineConfig,
) -> Result<SweepStats, DatabaseError> {
    let now = Utc::now();

    let processing_cutoff = now
        - ChronoDuration::from_std(config.stale_processing_threshold)
            .unwrap_or_else(|_| ChronoDuration::minutes(10));
    let reset_processing = db.reset_stale_processing(processing_cutoff).await?;
    if reset_processing > 0 {
        warn!(count = reset_processing, "Reset abandoned processing comments");
    }

    let pending_cutoff = now
        - ChronoDuration::from_std(config.stale_pending_threshold)
            .unwrap_or_else(|_| ChronoDuration::hours(1));
    let stale = db.stale_pending(pending_cutoff, 100).await?;
    if !stale.is_empty() {
        warn!(
            count = stale.len(),
            oldest = %stale[0].created_at,
            "Pending comments waiting past staleness threshold"
        );
    }

    let pruned_cache = db.prune_expired_cache().await?;
    if pruned_cache > 0 {
        info!(count = pruned_cache, "Pruned expired cache entries");
    }

    Ok(SweepStats {
        reset_processing,
        stale_pending: stale.len(),
        pruned_cache,
    })
}

/// Spawn the periodic sweep task.
pub fn spawn_sweep_task(
    db: Arc<dyn Database>,
    config: PipelineConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.sweep_interval);
        loop {
            interval.tick().await;
            if let Err(e) = run_sweep(db.as_ref(), &config).await {
                error!(error = %e, "Sweep pass failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::queue::{CommentStatus, NewComment};
    use crate::store::LibSqlBackend;

    async fn ingest(db: &LibSqlBackend, platform_id: &str) -> uuid::Uuid {
        db.ingest_comment(&NewComment {
            platform_comment_id: platform_id.into(),
            channel_id: "ch-1".into(),
            video_id: "vid-1".into(),
            author_name: "Alice".into(),
            author_handle: None,
            text: "hello".into(),
            priority: 0,
            published_at: Utc::now(),
        })
        .await
        .unwrap()
        .unwrap()
    }

    #[tokio::test]
    async fn abandoned_processing_is_reset() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let id = ingest(&db, "yt-1").await;
        db.claim_comment(id).await.unwrap();

        // Zero threshold: anything claimed before "now" counts as abandoned
        let config = PipelineConfig {
            stale_processing_threshold: Duration::ZERO,
            ..Default::default()
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        let stats = run_sweep(&db, &config).await.unwrap();
        assert_eq!(stats.reset_processing, 1);

        let comment = db.get_comment(id).await.unwrap().unwrap();
        assert_eq!(comment.status, CommentStatus::Pending);
    }

    #[tokio::test]
    async fn fresh_processing_is_left_alone() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let id = ingest(&db, "yt-1").await;
        db.claim_comment(id).await.unwrap();

        let stats = run_sweep(&db, &PipelineConfig::default()).await.unwrap();
        assert_eq!(stats.reset_processing, 0);

        let comment = db.get_comment(id).await.unwrap().unwrap();
        assert_eq!(comment.status, CommentStatus::Processing);
    }

    #[tokio::test]
    async fn stale_pending_is_counted_not_mutated() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let id = ingest(&db, "yt-1").await;

        let config = PipelineConfig {
            stale_pending_threshold: Duration::ZERO,
            ..Default::default()
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        let stats = run_sweep(&db, &config).await.unwrap();
        assert_eq!(stats.stale_pending, 1);

        // Surfaced, not touched
        let comment = db.get_comment(id).await.unwrap().unwrap();
        assert_eq!(comment.status, CommentStatus::Pending);
    }

    #[tokio::test]
    async fn sweep_prunes_expired_cache() {
        use crate::classify::Classification;
        use crate::response::ResponseCacheEntry;

        let db = LibSqlBackend::new_memory().await.unwrap();
        let now = Utc::now();
        db.cache_store(&ResponseCacheEntry {
            id: uuid::Uuid::new_v4(),
            fingerprint: "fp".into(),
            response_template: "old".into(),
            classification: Classification::General,
            usage_count: 0,
            last_used_at: now,
            expires_at: Some(now - chrono::Duration::seconds(1)),
            created_at: now,
        })
        .await
        .unwrap();

        let stats = run_sweep(&db, &PipelineConfig::default()).await.unwrap();
        assert_eq!(stats.pruned_cache, 1);
    }
}
