//! Detection rule model
//!
//! A rule is a weighted condition set: every condition that evaluates true
//! contributes its weight, and the rule matches when the accumulated score
//! reaches the rule's priority threshold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    Contains,
    Regex,
    Greater,
    Less,
    In,
    NotIn,
}

/// A single weighted condition over a dotted-path field of an event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: Value,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseActionType {
    Alert,
    Block,
    Isolate,
    Quarantine,
    Notify,
}

/// Response action attached to a rule; dispatched when the rule fires
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub action_type: ResponseActionType,
    pub target: String,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMetadata {
    pub author: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub tags: Vec<String>,
    pub mitre_tactics: Vec<String>,
    pub mitre_techniques: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRule {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    /// Matching threshold against the summed weights of true conditions
    pub priority: f64,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
    pub metadata: RuleMetadata,
}

/// Rule creation request body
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRule {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Created rules are enabled unless the body says otherwise
    pub enabled: Option<bool>,

    pub priority: f64,

    #[validate(length(min = 1, message = "at least one condition is required"))]
    pub conditions: Vec<RuleCondition>,

    #[serde(default)]
    pub actions: Vec<RuleAction>,

    pub author: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub mitre_tactics: Vec<String>,

    #[serde(default)]
    pub mitre_techniques: Vec<String>,
}

/// Partial rule update; absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRule {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub priority: Option<f64>,
    pub conditions: Option<Vec<RuleCondition>>,
    pub actions: Option<Vec<RuleAction>>,
}
