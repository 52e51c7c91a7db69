//! Behavioral profiling and risk assessment models

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Per-entity behavioral baseline, updated with each observation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehavioralProfile {
    pub entity_id: String,
    pub entity_type: String,
    /// Exponentially weighted moving average per observed metric
    pub baseline: HashMap<String, f64>,
    pub anomaly_score: f64,
    pub samples: u64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    pub name: String,
    pub weight: f64,
    pub score: f64,
    pub detail: String,
}

/// Weighted-sum risk score for an entity, 0-100
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub entity_id: String,
    pub risk_score: f64,
    pub factors: Vec<RiskFactor>,
    pub computed_at: DateTime<Utc>,
}

/// Observation request body
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ObserveEntity {
    #[validate(length(min = 1, message = "entityId must not be empty"))]
    pub entity_id: String,

    #[validate(length(min = 1, message = "entityType must not be empty"))]
    pub entity_type: String,

    #[validate(length(min = 1, message = "at least one metric is required"))]
    pub metrics: HashMap<String, f64>,
}
