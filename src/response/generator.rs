//! Response generation — cache, then canned templates, then the AI client.
//!
//! The order is a cost ladder: a cache hit costs one row read, a template
//! costs nothing, and an AI call is the expensive last resort. AI output is
//! written back to the cache so the same comment shape never pays twice.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::classify::Classification;
use crate::error::{Error, GenerationError};
use crate::fingerprint::fingerprint;
use crate::platform::{AiClient, GenerationContext};
use crate::queue::QueuedComment;
use crate::response::{ResponseCacheEntry, TemplateStore};
use crate::retry::RetryPolicy;
use crate::store::Database;

/// Where a generated response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Template,
    Ai,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Template => "template",
            Self::Ai => "ai",
        }
    }
}

/// A response ready for safety validation and dispatch.
#[derive(Debug, Clone)]
pub struct GeneratedResponse {
    pub text: String,
    pub source: ResponseSource,
    /// Fingerprint of the originating comment, for cache bookkeeping.
    pub fingerprint: String,
}

/// Produces response text for a classified comment.
pub struct ResponseGenerator {
    db: Arc<dyn Database>,
    ai: Arc<dyn AiClient>,
    templates: TemplateStore,
    retry: RetryPolicy,
    cache_ttl: std::time::Duration,
}

impl ResponseGenerator {
    pub fn new(
        db: Arc<dyn Database>,
        ai: Arc<dyn AiClient>,
        templates: TemplateStore,
        retry: RetryPolicy,
        cache_ttl: std::time::Duration,
    ) -> Self {
        Self {
            db,
            ai,
            templates,
            retry,
            cache_ttl,
        }
    }

    /// Generate a response for `comment`.
    ///
    /// The cache is consulted first regardless of `template_category`; a
    /// forced category only widens which template pool is tried before the
    /// AI fallback.
    pub async fn generate(
        &self,
        comment: &QueuedComment,
        classification: Classification,
        context: &GenerationContext,
        template_category: Option<Classification>,
    ) -> Result<GeneratedResponse, Error> {
        let fp = fingerprint(&comment.text, classification);

        if let Some(entry) = self.db.cache_lookup(&fp).await? {
            self.db.cache_touch(&fp).await?;
            debug!(
                comment_id = %comment.id,
                usage_count = entry.usage_count + 1,
                "Response served from cache"
            );
            return Ok(GeneratedResponse {
                text: entry.response_template,
                source: ResponseSource::Cache,
                fingerprint: fp,
            });
        }

        if let Some(category) = template_category {
            if let Some(text) = self.pick_template(category) {
                return Ok(GeneratedResponse {
                    text,
                    source: ResponseSource::Template,
                    fingerprint: fp,
                });
            }
            debug!(
                category = category.as_str(),
                "No templates for forced category, falling back"
            );
        }

        if let Some(text) = self.pick_template(classification) {
            return Ok(GeneratedResponse {
                text,
                source: ResponseSource::Template,
                fingerprint: fp,
            });
        }

        let text = self.generate_with_retry(&comment.text, context).await?;
        self.store_in_cache(&fp, &text, classification).await?;

        info!(comment_id = %comment.id, "Response generated by AI client");
        Ok(GeneratedResponse {
            text,
            source: ResponseSource::Ai,
            fingerprint: fp,
        })
    }

    /// Whether the template pool can serve this category at all.
    pub fn has_templates_for(&self, category: Classification) -> bool {
        self.templates.has_category(category)
    }

    fn pick_template(&self, category: Classification) -> Option<String> {
        let mut rng = rand::thread_rng();
        self.templates.pick(category, &mut rng)
    }

    async fn generate_with_retry(
        &self,
        comment_text: &str,
        context: &GenerationContext,
    ) -> Result<String, GenerationError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.ai.generate(comment_text, context).await {
                Ok(text) => {
                    let text = text.trim().to_string();
                    if text.is_empty() {
                        return Err(GenerationError::EmptyResponse);
                    }
                    return Ok(text);
                }
                Err(e) if e.is_transient() => {
                    match self.retry.delay_before_retry(attempt) {
                        Some(delay) => {
                            debug!(
                                attempt,
                                error = %e,
                                delay_ms = delay.as_millis() as u64,
                                "Generation attempt failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn store_in_cache(
        &self,
        fp: &str,
        text: &str,
        classification: Classification,
    ) -> Result<(), Error> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.cache_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(7));
        let entry = ResponseCacheEntry {
            id: Uuid::new_v4(),
            fingerprint: fp.to_string(),
            response_template: text.to_string(),
            classification,
            usage_count: 0,
            last_used_at: now,
            expires_at: Some(now + ttl),
            created_at: now,
        };
        self.db.cache_store(&entry).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::queue::{CommentStatus, NewComment};
    use crate::store::LibSqlBackend;

    /// AI client that counts calls and fails a configured number of times.
    struct CountingAi {
        calls: AtomicUsize,
        fail_first: usize,
        reply: String,
    }

    impl CountingAi {
        fn new(reply: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first: 0,
                reply: reply.to_string(),
            }
        }

        fn failing_first(reply: &str, failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first: failures,
                reply: reply.to_string(),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AiClient for CountingAi {
        async fn generate(
            &self,
            _comment_text: &str,
            _context: &GenerationContext,
        ) -> Result<String, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(GenerationError::RequestFailed("upstream 503".into()));
            }
            Ok(self.reply.clone())
        }
    }

    fn make_comment(text: &str) -> QueuedComment {
        QueuedComment {
            id: Uuid::new_v4(),
            platform_comment_id: "yt-1".into(),
            channel_id: "ch-1".into(),
            video_id: "vid-1".into(),
            author_name: "Alice".into(),
            author_handle: None,
            text: text.into(),
            classification: None,
            status: CommentStatus::Processing,
            priority: 0,
            error: None,
            created_at: Utc::now(),
            processed_at: None,
            last_batch_processed_at: None,
        }
    }

    fn ctx() -> GenerationContext {
        GenerationContext {
            channel_id: "ch-1".into(),
            video_id: "vid-1".into(),
            channel_name: None,
            video_title: None,
            style_notes: None,
        }
    }

    async fn make_generator(
        ai: Arc<CountingAi>,
        templates: TemplateStore,
    ) -> (ResponseGenerator, Arc<LibSqlBackend>) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let generator = ResponseGenerator::new(
            db.clone(),
            ai,
            templates,
            RetryPolicy::immediate(3),
            Duration::from_secs(3600),
        );
        (generator, db)
    }

    #[tokio::test]
    async fn template_category_skips_ai() {
        let ai = Arc::new(CountingAi::new("unused"));
        let (generator, _db) =
            make_generator(ai.clone(), TemplateStore::default_templates()).await;

        let comment = make_comment("Love this video!");
        let response = generator
            .generate(
                &comment,
                Classification::SimplePositive,
                &ctx(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(response.source, ResponseSource::Template);
        assert_eq!(ai.call_count(), 0);
    }

    #[tokio::test]
    async fn ai_result_is_cached_for_next_time() {
        let ai = Arc::new(CountingAi::new("Great question, covered at 3:41!"));
        let (generator, _db) = make_generator(ai.clone(), TemplateStore::empty()).await;

        let comment = make_comment("What lens do you use?");
        let first = generator
            .generate(&comment, Classification::Question, &ctx(), None)
            .await
            .unwrap();
        assert_eq!(first.source, ResponseSource::Ai);

        // Same normalized text + classification → cache hit, no second call
        let again = make_comment("  what LENS do you use?  ");
        let second = generator
            .generate(&again, Classification::Question, &ctx(), None)
            .await
            .unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.text, first.text);
        assert_eq!(ai.call_count(), 1);
    }

    #[tokio::test]
    async fn cache_hit_bumps_usage_count() {
        let ai = Arc::new(CountingAi::new("Thanks!"));
        let (generator, db) = make_generator(ai, TemplateStore::empty()).await;

        let comment = make_comment("How long did this take?");
        let first = generator
            .generate(&comment, Classification::Question, &ctx(), None)
            .await
            .unwrap();
        generator
            .generate(&comment, Classification::Question, &ctx(), None)
            .await
            .unwrap();

        let entry = db.cache_lookup(&first.fingerprint).await.unwrap().unwrap();
        assert_eq!(entry.usage_count, 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let ai = Arc::new(CountingAi::failing_first("Recovered reply", 2));
        let (generator, _db) = make_generator(ai.clone(), TemplateStore::empty()).await;

        let comment = make_comment("Any tips for beginners?");
        let response = generator
            .generate(&comment, Classification::Question, &ctx(), None)
            .await
            .unwrap();

        assert_eq!(response.source, ResponseSource::Ai);
        assert_eq!(response.text, "Recovered reply");
        assert_eq!(ai.call_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_error() {
        let ai = Arc::new(CountingAi::failing_first("never", 10));
        let (generator, db) = make_generator(ai.clone(), TemplateStore::empty()).await;

        let comment = make_comment("Any tips?");
        let result = generator
            .generate(&comment, Classification::Question, &ctx(), None)
            .await;

        assert!(matches!(
            result,
            Err(Error::Generation(GenerationError::RequestFailed(_)))
        ));
        assert_eq!(ai.call_count(), 3);

        // Nothing cached on failure
        let fp = fingerprint("Any tips?", Classification::Question);
        assert!(db.cache_lookup(&fp).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn forced_category_without_templates_falls_back() {
        let ai = Arc::new(CountingAi::new("AI fallback"));
        let (generator, _db) = make_generator(ai.clone(), TemplateStore::empty()).await;

        let comment = make_comment("hello there");
        let response = generator
            .generate(
                &comment,
                Classification::General,
                &ctx(),
                Some(Classification::SimplePositive),
            )
            .await
            .unwrap();

        assert_eq!(response.source, ResponseSource::Ai);
        assert_eq!(ai.call_count(), 1);
    }

    #[tokio::test]
    async fn cache_entry_wins_over_forced_category_template() {
        let ai = Arc::new(CountingAi::new("unused"));
        let (generator, db) =
            make_generator(ai.clone(), TemplateStore::default_templates()).await;

        let comment = make_comment("Love this video!");
        let fp = fingerprint(&comment.text, Classification::SimplePositive);
        let now = Utc::now();
        db.cache_store(&ResponseCacheEntry {
            id: Uuid::new_v4(),
            fingerprint: fp.clone(),
            response_template: "Cached thank-you".into(),
            classification: Classification::SimplePositive,
            usage_count: 0,
            last_used_at: now,
            expires_at: Some(now + chrono::Duration::hours(1)),
            created_at: now,
        })
        .await
        .unwrap();

        let response = generator
            .generate(
                &comment,
                Classification::SimplePositive,
                &ctx(),
                Some(Classification::SimplePositive),
            )
            .await
            .unwrap();

        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.text, "Cached thank-you");
        assert_eq!(ai.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_ai_output_is_an_error() {
        let ai = Arc::new(CountingAi::new("   "));
        let (generator, _db) = make_generator(ai, TemplateStore::empty()).await;

        let comment = make_comment("hello");
        let result = generator
            .generate(&comment, Classification::General, &ctx(), None)
            .await;
        assert!(matches!(
            result,
            Err(Error::Generation(GenerationError::EmptyResponse))
        ));
    }

    async fn ingest(db: &LibSqlBackend) -> Uuid {
        db.ingest_comment(&NewComment {
            platform_comment_id: "yt-seed".into(),
            channel_id: "ch-1".into(),
            video_id: "vid-1".into(),
            author_name: "Bob".into(),
            author_handle: None,
            text: "seed".into(),
            priority: 0,
            published_at: Utc::now(),
        })
        .await
        .unwrap()
        .unwrap()
    }

    #[tokio::test]
    async fn generator_shares_cache_with_other_store_users() {
        let ai = Arc::new(CountingAi::new("cached elsewhere"));
        let (generator, db) = make_generator(ai, TemplateStore::empty()).await;
        ingest(&db).await;

        let comment = make_comment("unique text");
        let response = generator
            .generate(&comment, Classification::General, &ctx(), None)
            .await
            .unwrap();

        let stored = db.cache_lookup(&response.fingerprint).await.unwrap();
        assert!(stored.is_some());
        assert_eq!(stored.unwrap().classification, Classification::General);
    }
}
