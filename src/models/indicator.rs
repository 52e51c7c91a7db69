//! Threat indicator model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Kind of atomic threat data an indicator carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorType {
    Ip,
    Domain,
    Hash,
    Url,
    Email,
    File,
}

impl IndicatorType {
    pub fn category(&self) -> &'static str {
        match self {
            IndicatorType::Ip => "network",
            IndicatorType::Domain => "network",
            IndicatorType::Url => "network",
            IndicatorType::Hash => "file",
            IndicatorType::File => "file",
            IndicatorType::Email => "identity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Numeric rank used for correlation severity (1-4)
    pub fn rank(self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }
}

/// Enrichment fields filled in place after ingestion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorContext {
    pub geolocation: Option<String>,
    pub asn: Option<String>,
    pub category: Option<String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// An atomic piece of threat data. Append-only for the process lifetime;
/// only `context` is mutated (enrichment) after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatIndicator {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub indicator_type: IndicatorType,
    pub value: String,
    pub confidence: f64,
    pub severity: Severity,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub tags: Vec<String>,
    pub context: IndicatorContext,
}

/// Ingestion request body
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateIndicator {
    #[serde(rename = "type")]
    pub indicator_type: IndicatorType,

    #[validate(length(min = 1, message = "value must not be empty"))]
    pub value: String,

    #[validate(range(min = 0.0, max = 1.0, message = "confidence must be in [0, 1]"))]
    pub confidence: f64,

    pub severity: Severity,

    #[validate(length(min = 1, message = "source must not be empty"))]
    pub source: String,

    #[serde(default)]
    pub tags: Vec<String>,
}
