//! User-defined automation rules and their evaluation engine.

pub mod engine;
pub mod model;

pub use engine::{Evaluation, RuleEngine, RuleMatch, RunLimits};
pub use model::{
    AutomationRule, ExecutedAction, RuleAction, RuleCondition, RuleExecution,
};
