//! Response action dispatcher
//!
//! Switches on the action type and records the outcome. No external
//! blocking or isolation integration exists; every branch logs and returns.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{ResponseActionType, RuleAction};

/// What triggered a dispatched action
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub trigger: String,
}

/// One executed action, kept in a bounded history
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub action_type: ResponseActionType,
    pub target: String,
    pub rule_id: Uuid,
    pub rule_name: String,
    pub trigger: String,
    pub outcome: String,
    pub timestamp: DateTime<Utc>,
}

pub struct ActionDispatcher {
    history: Vec<ActionRecord>,
    max_history: usize,
    total_executed: u64,
}

impl ActionDispatcher {
    pub fn new(max_history: usize) -> Self {
        Self {
            history: Vec::new(),
            max_history,
            total_executed: 0,
        }
    }

    /// `execute(action, context)`: log, record, return
    pub fn execute(&mut self, action: &RuleAction, context: &ActionContext) {
        let outcome = match action.action_type {
            ResponseActionType::Alert => {
                tracing::warn!(
                    rule = %context.rule_name,
                    target = %action.target,
                    trigger = %context.trigger,
                    "alert raised"
                );
                "alert raised"
            }
            ResponseActionType::Block => {
                tracing::warn!(
                    rule = %context.rule_name,
                    target = %action.target,
                    "block requested (no enforcement backend)"
                );
                "block recorded"
            }
            ResponseActionType::Isolate => {
                tracing::warn!(
                    rule = %context.rule_name,
                    target = %action.target,
                    "isolation requested (no enforcement backend)"
                );
                "isolation recorded"
            }
            ResponseActionType::Quarantine => {
                tracing::warn!(
                    rule = %context.rule_name,
                    target = %action.target,
                    "quarantine requested (no enforcement backend)"
                );
                "quarantine recorded"
            }
            ResponseActionType::Notify => {
                tracing::info!(
                    rule = %context.rule_name,
                    target = %action.target,
                    "notification sent"
                );
                "notification sent"
            }
        };

        self.record(ActionRecord {
            action_type: action.action_type,
            target: action.target.clone(),
            rule_id: context.rule_id,
            rule_name: context.rule_name.clone(),
            trigger: context.trigger.clone(),
            outcome: outcome.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn record(&mut self, record: ActionRecord) {
        self.total_executed += 1;
        self.history.push(record);

        let len = self.history.len();
        if len > self.max_history {
            self.history.drain(0..len - self.max_history);
        }
    }

    pub fn history(&self) -> &[ActionRecord] {
        &self.history
    }

    pub fn total_executed(&self) -> u64 {
        self.total_executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn alert(target: &str) -> RuleAction {
        RuleAction {
            action_type: ResponseActionType::Alert,
            target: target.to_string(),
            parameters: Value::Null,
        }
    }

    fn ctx() -> ActionContext {
        ActionContext {
            rule_id: Uuid::new_v4(),
            rule_name: "test rule".to_string(),
            trigger: "unit test".to_string(),
        }
    }

    #[test]
    fn test_execute_records_history() {
        let mut dispatcher = ActionDispatcher::new(10);
        dispatcher.execute(&alert("soc"), &ctx());

        assert_eq!(dispatcher.history().len(), 1);
        assert_eq!(dispatcher.total_executed(), 1);
        assert_eq!(dispatcher.history()[0].target, "soc");
    }

    #[test]
    fn test_history_is_bounded() {
        let mut dispatcher = ActionDispatcher::new(3);
        for i in 0..5 {
            dispatcher.execute(&alert(&format!("t{}", i)), &ctx());
        }

        assert_eq!(dispatcher.history().len(), 3);
        // Oldest entries dropped first
        assert_eq!(dispatcher.history()[0].target, "t2");
        assert_eq!(dispatcher.total_executed(), 5);
    }
}
