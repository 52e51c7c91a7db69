//! Correlation model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::indicator::ThreatIndicator;
use super::rule::RuleAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStatus {
    Active,
    Resolved,
    FalsePositive,
}

/// Groups indicators observed within a time window that share type or
/// geolocation with a triggering indicator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationRule {
    pub id: Uuid,
    pub name: String,
    pub enabled: bool,
    pub time_window_minutes: i64,
    pub min_occurrences: usize,
    pub actions: Vec<RuleAction>,
}

/// A grouping of indicators deemed related by a correlation rule.
/// Ephemeral, held only in an in-process list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub indicators: Vec<ThreatIndicator>,
    pub confidence: f64,
    /// 1 (low) through 4 (critical), the max rank of the member indicators
    pub severity: u8,
    pub timestamp: DateTime<Utc>,
    pub status: CorrelationStatus,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCorrelationRule {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,

    pub enabled: Option<bool>,

    #[validate(range(min = 1, message = "time window must be at least one minute"))]
    pub time_window_minutes: i64,

    #[validate(range(min = 2, message = "minimum occurrences must be at least 2"))]
    pub min_occurrences: usize,

    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCorrelationStatus {
    pub status: CorrelationStatus,
}
