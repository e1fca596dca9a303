//! The batch processor — drives each claimed comment through the full
//! pipeline: classify, match rules, generate, validate, dispatch.
//!
//! Per-comment failures are isolated: a comment that errors is marked
//! `failed` with its error recorded, and the batch moves on. Only store
//! errors on the batch query itself abort a run.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::classify::{Classification, Classifier};
use crate::config::PipelineConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::platform::{AiClient, GenerationContext, PlatformClient};
use crate::queue::QueuedComment;
use crate::response::{AiResponse, ResponseGenerator, ResponseSource, ResponseType, TemplateStore};
use crate::rules::{Evaluation, RuleAction, RuleEngine, RuleExecution, RunLimits};
use crate::safety::SafetyValidator;
use crate::store::Database;

/// Aggregated result of one batch run.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchOutcome {
    /// Comments successfully claimed this run.
    pub claimed: usize,
    /// Claims lost to a concurrent worker.
    pub skipped: usize,
    pub completed: usize,
    pub ignored: usize,
    pub failed: usize,
    /// Replies actually posted to the platform.
    pub responses_sent: usize,
    /// Responses parked for human approval.
    pub awaiting_approval: usize,
    /// Responses served from the fingerprint cache.
    pub cache_hits: usize,
}

/// Outcome of a single claimed comment.
enum CommentOutcome {
    Responded(ResponseSource),
    AwaitingApproval,
    Deleted,
    Flagged,
    Ignored,
}

/// Drives queued comments through the automation pipeline.
pub struct CommentProcessor {
    db: Arc<dyn Database>,
    classifier: Classifier,
    engine: RuleEngine,
    generator: ResponseGenerator,
    safety: SafetyValidator,
    dispatcher: Dispatcher,
    config: PipelineConfig,
}

impl CommentProcessor {
    pub fn new(
        db: Arc<dyn Database>,
        ai: Arc<dyn AiClient>,
        platform: Arc<dyn PlatformClient>,
        templates: TemplateStore,
        config: PipelineConfig,
    ) -> Self {
        let generator = ResponseGenerator::new(
            db.clone(),
            ai,
            templates,
            config.generation_retry.clone(),
            config.cache_ttl,
        );
        let dispatcher = Dispatcher::new(db.clone(), platform, config.dispatch_retry.clone());
        Self {
            db,
            classifier: Classifier::new(),
            engine: RuleEngine::new(),
            generator,
            safety: SafetyValidator::new(),
            dispatcher,
            config,
        }
    }

    /// Run one batch: claim up to `batch_size` pending comments and process
    /// each to a terminal state.
    pub async fn run_batch(&self) -> Result<BatchOutcome> {
        let pending = self.db.pending_comments(self.config.batch_size).await?;
        if pending.is_empty() {
            debug!("No pending comments");
            return Ok(BatchOutcome::default());
        }

        let mut limits = RunLimits::new();
        let mut outcome = BatchOutcome::default();

        for comment in pending {
            if !self.db.claim_comment(comment.id).await? {
                debug!(comment_id = %comment.id, "Claim lost, skipping");
                outcome.skipped += 1;
                continue;
            }
            outcome.claimed += 1;

            match self.process_claimed(&comment, &mut limits).await {
                Ok(CommentOutcome::Responded(source)) => {
                    outcome.completed += 1;
                    outcome.responses_sent += 1;
                    if source == ResponseSource::Cache {
                        outcome.cache_hits += 1;
                    }
                }
                Ok(CommentOutcome::AwaitingApproval) => {
                    outcome.completed += 1;
                    outcome.awaiting_approval += 1;
                }
                Ok(CommentOutcome::Deleted) | Ok(CommentOutcome::Flagged) => {
                    outcome.completed += 1;
                }
                Ok(CommentOutcome::Ignored) => {
                    outcome.ignored += 1;
                }
                Err(e) => {
                    warn!(comment_id = %comment.id, error = %e, "Comment processing failed");
                    if let Err(db_err) =
                        self.db.fail_comment(comment.id, &e.to_string()).await
                    {
                        error!(
                            comment_id = %comment.id,
                            error = %db_err,
                            "Could not record comment failure"
                        );
                    }
                    outcome.failed += 1;
                }
            }
        }

        info!(
            claimed = outcome.claimed,
            completed = outcome.completed,
            ignored = outcome.ignored,
            failed = outcome.failed,
            responses_sent = outcome.responses_sent,
            awaiting_approval = outcome.awaiting_approval,
            "Batch run complete"
        );
        Ok(outcome)
    }

    async fn process_claimed(
        &self,
        comment: &QueuedComment,
        limits: &mut RunLimits,
    ) -> Result<CommentOutcome> {
        let started = Instant::now();

        let classification = self.classifier.classify(&comment.text);
        self.db.set_classification(comment.id, classification).await?;
        debug!(
            comment_id = %comment.id,
            classification = classification.as_str(),
            "Comment classified"
        );

        // Rule conditions read the classification off the comment, so the
        // snapshot from the pending query must be refreshed first.
        let mut comment = comment.clone();
        comment.classification = Some(classification);
        let comment = &comment;

        let rules = self.db.rules_for_channel(&comment.channel_id).await?;
        let matched = match self.engine.evaluate(comment, &rules, limits) {
            Evaluation::Matched(matched) => matched,
            // A limit-capped match must not fall through to the no-rule
            // default, or the cap would never actually cap anything.
            Evaluation::LimitCapped => {
                debug!(comment_id = %comment.id, "Matching rules limit-capped, ignoring");
                self.db.ignore_comment(comment.id).await?;
                return Ok(CommentOutcome::Ignored);
            }
            Evaluation::NoMatch => {
                // Built-in default: simple praise gets a canned thank-you
                // even with no custom rule configured. Everything else is
                // ignored.
                if classification == Classification::SimplePositive
                    && self.generator.has_templates_for(classification)
                {
                    return self
                        .respond(comment, classification, Some(classification), false, None)
                        .await;
                }
                self.db.ignore_comment(comment.id).await?;
                return Ok(CommentOutcome::Ignored);
            }
        };
        let rule = matched.rule;
        limits.record_fire(rule.id);

        // The audit row records selection, not outcome: a rule that fires
        // and then errors still shows up in the execution log.
        let execution = RuleExecution::record(
            &rule,
            comment.id,
            &comment.video_id,
            started.elapsed().as_millis() as i64,
        );
        self.db.insert_rule_execution(&execution).await?;

        let outcome = match &rule.action {
            RuleAction::Respond { template_category } => {
                self.respond(
                    comment,
                    classification,
                    *template_category,
                    rule.require_approval,
                    Some(&rule.name),
                )
                .await?
            }
            RuleAction::Delete => {
                self.dispatcher.delete(comment).await?;
                self.db.complete_comment(comment.id).await?;
                CommentOutcome::Deleted
            }
            RuleAction::Flag => {
                self.dispatcher.flag(comment).await?;
                self.db.complete_comment(comment.id).await?;
                CommentOutcome::Flagged
            }
        };

        Ok(outcome)
    }

    async fn respond(
        &self,
        comment: &QueuedComment,
        classification: Classification,
        template_category: Option<Classification>,
        require_approval: bool,
        rule_name: Option<&str>,
    ) -> Result<CommentOutcome> {
        let context = GenerationContext {
            channel_id: comment.channel_id.clone(),
            video_id: comment.video_id.clone(),
            channel_name: None,
            video_title: None,
            style_notes: None,
        };

        let generated = self
            .generator
            .generate(comment, classification, &context, template_category)
            .await?;

        // Every generated response gets a persisted record so safety and
        // approval state survive restarts, whatever its source.
        let response = AiResponse::new(comment.id, &generated.text);
        self.db.insert_ai_response(&response).await?;

        let verdict = self.safety.check(&generated.text);
        self.db
            .set_safety_outcome(
                response.id,
                verdict.passed,
                verdict.notes_summary().as_deref(),
            )
            .await?;

        // A failed check is a routed outcome, not an error: the response is
        // parked for human review alongside approval-required ones.
        if !verdict.passed || require_approval {
            info!(
                comment_id = %comment.id,
                response_id = %response.id,
                rule = rule_name.unwrap_or("default"),
                passed_safety = verdict.passed,
                "Response parked for human review"
            );
            self.db.complete_comment(comment.id).await?;
            return Ok(CommentOutcome::AwaitingApproval);
        }

        self.dispatcher
            .dispatch_reply(comment, &generated.text, ResponseType::Automated)
            .await
            .map_err(Error::Pipeline)?;
        self.db.mark_posted(response.id).await?;
        self.db.complete_comment(comment.id).await?;

        Ok(CommentOutcome::Responded(generated.source))
    }
}
