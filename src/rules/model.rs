//! Rule data model — conditions, actions, and execution audit records.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::Classification;
use crate::error::RuleError;

/// A single trigger condition. Conditions in a rule are AND-combined.
///
/// Closed set of kinds rather than a polymorphic matcher — evaluation stays
/// deterministic and serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Comment classification is one of the listed labels.
    Classification { any_of: Vec<Classification> },
    /// Comment text contains the keywords (case-insensitive).
    /// `match_all = false` means any keyword suffices.
    Keyword {
        keywords: Vec<String>,
        #[serde(default)]
        match_all: bool,
    },
    /// Comment text matches a regex. Validated at rule-save time.
    Pattern { pattern: String },
    /// Sentiment-style trigger, driven by the classifier label.
    Sentiment { negative: bool },
}

/// What a matched rule does with the comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleAction {
    /// Generate and post (or park for approval) a reply.
    Respond {
        /// Force a canned-template category instead of cache/AI.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template_category: Option<Classification>,
    },
    /// Delete the comment via the platform client.
    Delete,
    /// Flag the comment for the creator's attention.
    Flag,
}

impl RuleAction {
    /// Short label for logging and audit records.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Respond { .. } => "respond",
            Self::Delete => "delete",
            Self::Flag => "flag",
        }
    }
}

/// A user-owned, channel-scoped automation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: Uuid,
    /// Owning channel — rules only apply to comments on this channel.
    pub channel_id: String,
    pub name: String,
    pub enabled: bool,
    /// Evaluated high-to-low; ties broken by creation order.
    pub priority: i32,
    /// AND-combined trigger conditions.
    pub conditions: Vec<RuleCondition>,
    pub action: RuleAction,
    /// Max times this rule may fire per batch run.
    pub response_limit_per_run: u32,
    /// Route generated responses to human review instead of auto-dispatch.
    pub require_approval: bool,
    /// Optional A/B variant tag, propagated into execution records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Adaptive/learning configuration, opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intelligence: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AutomationRule {
    /// Create a new enabled rule with defaults.
    pub fn new(
        channel_id: impl Into<String>,
        name: impl Into<String>,
        priority: i32,
        conditions: Vec<RuleCondition>,
        action: RuleAction,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            channel_id: channel_id.into(),
            name: name.into(),
            enabled: true,
            priority,
            conditions,
            action,
            response_limit_per_run: 50,
            require_approval: false,
            variant: None,
            intelligence: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the per-run response limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.response_limit_per_run = limit;
        self
    }

    /// Require human approval before any generated response is dispatched.
    pub fn with_require_approval(mut self, require: bool) -> Self {
        self.require_approval = require;
        self
    }

    /// Tag this rule with an A/B variant label.
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Validate the rule before it is saved.
    ///
    /// Malformed rules are rejected here and never reach the queue.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.name.trim().is_empty() {
            return Err(RuleError::EmptyName);
        }
        if self.conditions.is_empty() {
            return Err(RuleError::NoConditions);
        }
        if self.response_limit_per_run < 1 {
            return Err(RuleError::InvalidLimit(self.response_limit_per_run));
        }
        for condition in &self.conditions {
            match condition {
                RuleCondition::Keyword { keywords, .. } => {
                    if keywords.is_empty() || keywords.iter().all(|k| k.trim().is_empty()) {
                        return Err(RuleError::EmptyKeywords);
                    }
                }
                RuleCondition::Pattern { pattern } => {
                    Regex::new(pattern)
                        .map_err(|e| RuleError::InvalidPattern(e.to_string()))?;
                }
                RuleCondition::Classification { .. } | RuleCondition::Sentiment { .. } => {}
            }
        }
        Ok(())
    }
}

/// Action recorded in a `RuleExecution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutedAction {
    Respond,
    Delete,
    Flag,
}

impl ExecutedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Respond => "respond",
            Self::Delete => "delete",
            Self::Flag => "flag",
        }
    }
}

impl std::str::FromStr for ExecutedAction {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "respond" => Ok(Self::Respond),
            "delete" => Ok(Self::Delete),
            "flag" => Ok(Self::Flag),
            _ => Err(format!("Unknown executed action: {}", s)),
        }
    }
}

impl From<&RuleAction> for ExecutedAction {
    fn from(action: &RuleAction) -> Self {
        match action {
            RuleAction::Respond { .. } => Self::Respond,
            RuleAction::Delete => Self::Delete,
            RuleAction::Flag => Self::Flag,
        }
    }
}

/// Immutable audit record — one per rule match, never mutated.
#[derive(Debug, Clone)]
pub struct RuleExecution {
    pub id: Uuid,
    /// Nullable: the rule may have been deleted since (FK SET NULL).
    pub rule_id: Option<Uuid>,
    pub comment_id: Uuid,
    pub video_id: String,
    /// JSON snapshot of the conditions that matched.
    pub matched_conditions: serde_json::Value,
    pub action: ExecutedAction,
    /// A/B variant tag carried over from the rule.
    pub variant: Option<String>,
    /// User-context snapshot at execution time.
    pub user_context: Option<serde_json::Value>,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl RuleExecution {
    /// Build an execution record for a matched rule.
    pub fn record(
        rule: &AutomationRule,
        comment_id: Uuid,
        video_id: impl Into<String>,
        duration_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: Some(rule.id),
            comment_id,
            video_id: video_id.into(),
            matched_conditions: serde_json::to_value(&rule.conditions)
                .unwrap_or(serde_json::Value::Null),
            action: ExecutedAction::from(&rule.action),
            variant: rule.variant.clone(),
            user_context: None,
            duration_ms,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_rule(conditions: Vec<RuleCondition>) -> AutomationRule {
        AutomationRule::new("ch-1", "test rule", 10, conditions, RuleAction::Flag)
    }

    #[test]
    fn valid_rule_passes() {
        let rule = base_rule(vec![RuleCondition::Sentiment { negative: true }]);
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let mut rule = base_rule(vec![RuleCondition::Sentiment { negative: true }]);
        rule.name = "   ".into();
        assert!(matches!(rule.validate(), Err(RuleError::EmptyName)));
    }

    #[test]
    fn no_conditions_rejected() {
        let rule = base_rule(vec![]);
        assert!(matches!(rule.validate(), Err(RuleError::NoConditions)));
    }

    #[test]
    fn empty_keywords_rejected() {
        let rule = base_rule(vec![RuleCondition::Keyword {
            keywords: vec!["  ".into()],
            match_all: false,
        }]);
        assert!(matches!(rule.validate(), Err(RuleError::EmptyKeywords)));
    }

    #[test]
    fn bad_pattern_rejected() {
        let rule = base_rule(vec![RuleCondition::Pattern {
            pattern: "([unclosed".into(),
        }]);
        assert!(matches!(rule.validate(), Err(RuleError::InvalidPattern(_))));
    }

    #[test]
    fn zero_limit_rejected() {
        let rule = base_rule(vec![RuleCondition::Sentiment { negative: true }]).with_limit(0);
        assert!(matches!(rule.validate(), Err(RuleError::InvalidLimit(0))));
    }

    #[test]
    fn condition_serialization_is_tagged() {
        let cond = RuleCondition::Keyword {
            keywords: vec!["giveaway".into()],
            match_all: false,
        };
        let json = serde_json::to_value(&cond).unwrap();
        assert_eq!(json["kind"], "keyword");
        assert_eq!(json["keywords"][0], "giveaway");
    }

    #[test]
    fn action_serialization_is_tagged() {
        let action = RuleAction::Respond {
            template_category: Some(Classification::SimplePositive),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "respond");
        assert_eq!(json["template_category"], "simple_positive");

        let parsed: RuleAction = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, action);
    }

    #[test]
    fn execution_record_snapshots_conditions() {
        let rule = base_rule(vec![RuleCondition::Classification {
            any_of: vec![Classification::Negative],
        }])
        .with_variant("b");
        let comment_id = Uuid::new_v4();
        let exec = RuleExecution::record(&rule, comment_id, "vid-9", 12);

        assert_eq!(exec.rule_id, Some(rule.id));
        assert_eq!(exec.comment_id, comment_id);
        assert_eq!(exec.action, ExecutedAction::Flag);
        assert_eq!(exec.variant.as_deref(), Some("b"));
        assert_eq!(exec.matched_conditions[0]["kind"], "classification");
    }
}
