//! Request handlers

pub mod detection;
pub mod health;
pub mod network;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Success envelope returned by every XDR endpoint
#[derive(Debug, Serialize)]
pub struct ApiEnvelope {
    pub success: bool,
    pub data: Value,
    pub metadata: EnvelopeMetadata,
}

#[derive(Debug, Serialize)]
pub struct EnvelopeMetadata {
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
}

impl ApiEnvelope {
    pub fn new(data: Value) -> Self {
        Self {
            success: true,
            data,
            metadata: EnvelopeMetadata {
                timestamp: Utc::now(),
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}

/// Deserialize and validate a typed request DTO from the raw JSON body.
/// The `action` query parameter picks the DTO type, so bodies arrive as
/// `Value` and cross the validation boundary here.
pub(crate) fn parse_body<T>(body: Value) -> AppResult<T>
where
    T: serde::de::DeserializeOwned + Validate,
{
    let dto: T = serde_json::from_value(body)?;
    dto.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;
    Ok(dto)
}
