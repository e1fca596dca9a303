//! Rule engine — ordered, short-circuit evaluation of automation rules.
//!
//! Given a claimed comment and the enabled rules for its channel, produces
//! zero or one `(rule, action)` pairs. First match wins: rules are scanned
//! in strictly descending priority, ties broken by creation order, and the
//! scan stops at the first rule whose conditions all hold and whose
//! run-scoped response limit is not exhausted.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::classify::Classification;
use crate::queue::QueuedComment;
use crate::rules::model::{AutomationRule, RuleCondition};

/// Run-scoped response-limit counters.
///
/// Owned by a single batch run; a rule that has fired `response_limit_per_run`
/// times in this run is skipped for the rest of the run.
#[derive(Debug, Default)]
pub struct RunLimits {
    fired: HashMap<Uuid, u32>,
}

impl RunLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the rule still has budget in this run.
    pub fn allows(&self, rule: &AutomationRule) -> bool {
        self.fired.get(&rule.id).copied().unwrap_or(0) < rule.response_limit_per_run
    }

    /// Record that the rule fired once.
    pub fn record_fire(&mut self, rule_id: Uuid) {
        *self.fired.entry(rule_id).or_insert(0) += 1;
    }

    /// Times the rule has fired in this run.
    pub fn fired_count(&self, rule_id: Uuid) -> u32 {
        self.fired.get(&rule_id).copied().unwrap_or(0)
    }
}

/// A selected rule match.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub rule: AutomationRule,
}

/// Outcome of evaluating a comment against its channel's rules.
#[derive(Debug, Clone)]
pub enum Evaluation {
    /// A rule matched with run budget remaining.
    Matched(RuleMatch),
    /// At least one rule matched, but every match was limit-capped.
    LimitCapped,
    /// No rule's conditions held.
    NoMatch,
}

impl Evaluation {
    /// The selected match, if any.
    pub fn into_matched(self) -> Option<RuleMatch> {
        match self {
            Self::Matched(m) => Some(m),
            Self::LimitCapped | Self::NoMatch => None,
        }
    }
}

/// Evaluates automation rules against queued comments.
///
/// Stateless and side-effect-free — safe to re-run.
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `rules` against `comment` in priority order.
    ///
    /// `rules` may arrive in any order; they are sorted here so callers
    /// don't have to guarantee store ordering. Returns the first enabled
    /// rule whose conditions all match and whose run limit allows firing.
    /// A comment whose only matches are limit-capped reports `LimitCapped`
    /// rather than `NoMatch`, so callers can suppress no-rule defaults.
    pub fn evaluate(
        &self,
        comment: &QueuedComment,
        rules: &[AutomationRule],
        limits: &RunLimits,
    ) -> Evaluation {
        let mut ordered: Vec<&AutomationRule> = rules
            .iter()
            .filter(|r| r.enabled && r.channel_id == comment.channel_id)
            .collect();
        ordered.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });

        let mut capped = false;
        for rule in ordered {
            if !self.matches(comment, rule) {
                continue;
            }
            if !limits.allows(rule) {
                debug!(
                    rule = %rule.name,
                    comment_id = %comment.id,
                    limit = rule.response_limit_per_run,
                    "Rule matched but run limit exhausted, trying lower-priority rules"
                );
                capped = true;
                continue;
            }
            debug!(
                rule = %rule.name,
                priority = rule.priority,
                comment_id = %comment.id,
                action = rule.action.label(),
                "Rule matched"
            );
            return Evaluation::Matched(RuleMatch { rule: rule.clone() });
        }
        if capped {
            Evaluation::LimitCapped
        } else {
            Evaluation::NoMatch
        }
    }

    /// Whether all of a rule's conditions hold for the comment.
    fn matches(&self, comment: &QueuedComment, rule: &AutomationRule) -> bool {
        rule.conditions
            .iter()
            .all(|c| condition_matches(c, comment))
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn condition_matches(condition: &RuleCondition, comment: &QueuedComment) -> bool {
    match condition {
        RuleCondition::Classification { any_of } => comment
            .classification
            .is_some_and(|c| any_of.contains(&c)),
        RuleCondition::Keyword {
            keywords,
            match_all,
        } => {
            let text = comment.text.to_lowercase();
            let hit = |k: &String| text.contains(&k.to_lowercase());
            if *match_all {
                keywords.iter().all(hit)
            } else {
                keywords.iter().any(hit)
            }
        }
        // Pattern validity is enforced at rule-save time; a pattern that
        // somehow fails to compile here simply never matches.
        RuleCondition::Pattern { pattern } => Regex::new(pattern)
            .map(|r| r.is_match(&comment.text))
            .unwrap_or(false),
        RuleCondition::Sentiment { negative } => match comment.classification {
            Some(Classification::Negative) => *negative,
            Some(Classification::SimplePositive) => !*negative,
            _ => false,
        },
    }
}
