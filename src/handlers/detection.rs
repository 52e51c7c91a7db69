//! Detection engine handlers
//!
//! One route per HTTP method on `/api/v1/xdr/detection-engine`, with an
//! `action` query parameter selecting the operation.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{
    CreateCorrelationRule, CreateIndicator, CreateRule, ObserveEntity, UpdateCorrelationStatus,
    UpdateRule,
};
use crate::{AppError, AppResult, AppState};

use super::{parse_body, ApiEnvelope};

#[derive(Debug, Default, Deserialize)]
pub struct ActionQuery {
    pub action: Option<String>,
    pub id: Option<Uuid>,
    pub entity: Option<String>,
}

fn require_id(query: &ActionQuery) -> AppResult<Uuid> {
    query
        .id
        .ok_or_else(|| AppError::BadRequest("id parameter required".to_string()))
}

/// Engine overview and read actions
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
) -> AppResult<Json<ApiEnvelope>> {
    let engine = &state.detection;

    let data = match query.action.as_deref() {
        None => json!({
            "status": "running",
            "metrics": engine.metrics(),
        }),
        Some("indicators") => json!(engine.indicators()),
        Some("rules") => json!(engine.rules()),
        Some("correlation-rules") => json!(engine.correlation_rules()),
        Some("correlations") => json!(engine.correlations()),
        Some("actions") => json!(engine.action_history()),
        Some("profiles") => json!(engine.profiles()),
        Some("risk") => {
            let entity = query
                .entity
                .ok_or_else(|| AppError::BadRequest("entity parameter required".to_string()))?;
            let assessment = engine.assess_risk(&entity).ok_or_else(|| {
                AppError::NotFound(format!("no behavioral profile for entity '{}'", entity))
            })?;
            json!(assessment)
        }
        Some(other) => {
            return Err(AppError::BadRequest(format!("unknown action '{}'", other)));
        }
    };

    Ok(Json(ApiEnvelope::new(data)))
}

/// Create actions: indicator, rule, correlation-rule, observe, evaluate
pub async fn create(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
    Json(body): Json<Value>,
) -> AppResult<Json<ApiEnvelope>> {
    let engine = &state.detection;

    let data = match query.action.as_deref() {
        Some("indicator") => {
            let req: CreateIndicator = parse_body(body)?;
            json!(engine.add_indicator(req))
        }
        Some("rule") => {
            let req: CreateRule = parse_body(body)?;
            let rule = engine.add_rule(req);
            json!({ "id": rule.id })
        }
        Some("correlation-rule") => {
            let req: CreateCorrelationRule = parse_body(body)?;
            let rule = engine.add_correlation_rule(req);
            json!({ "id": rule.id })
        }
        Some("observe") => {
            let req: ObserveEntity = parse_body(body)?;
            json!(engine.observe_entity(req))
        }
        Some("evaluate") => json!(engine.evaluate_event(&body)),
        Some(other) => {
            return Err(AppError::BadRequest(format!("unknown action '{}'", other)));
        }
        None => {
            return Err(AppError::BadRequest("action parameter required".to_string()));
        }
    };

    Ok(Json(ApiEnvelope::new(data)))
}

/// Update actions: rule, correlation-status
pub async fn update(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
    Json(body): Json<Value>,
) -> AppResult<Json<ApiEnvelope>> {
    let engine = &state.detection;

    let data = match query.action.as_deref() {
        Some("rule") => {
            let id = require_id(&query)?;
            let req: UpdateRule = serde_json::from_value(body)?;
            let rule = engine
                .update_rule(id, req)
                .ok_or_else(|| AppError::NotFound("Rule not found".to_string()))?;
            json!(rule)
        }
        Some("correlation-status") => {
            let id = require_id(&query)?;
            let req: UpdateCorrelationStatus = serde_json::from_value(body)?;
            let correlation = engine
                .set_correlation_status(id, req.status)
                .ok_or_else(|| AppError::NotFound("Correlation not found".to_string()))?;
            json!(correlation)
        }
        Some(other) => {
            return Err(AppError::BadRequest(format!("unknown action '{}'", other)));
        }
        None => {
            return Err(AppError::BadRequest("action parameter required".to_string()));
        }
    };

    Ok(Json(ApiEnvelope::new(data)))
}

/// Delete actions: rule
pub async fn remove(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
) -> AppResult<Json<ApiEnvelope>> {
    let engine = &state.detection;

    let data = match query.action.as_deref() {
        Some("rule") => {
            let id = require_id(&query)?;
            if !engine.remove_rule(id) {
                return Err(AppError::NotFound("Rule not found".to_string()));
            }
            json!({ "deleted": true })
        }
        Some(other) => {
            return Err(AppError::BadRequest(format!("unknown action '{}'", other)));
        }
        None => {
            return Err(AppError::BadRequest("action parameter required".to_string()));
        }
    };

    Ok(Json(ApiEnvelope::new(data)))
}
