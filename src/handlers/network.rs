//! Network analysis handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};

use crate::models::CreateFlow;
use crate::{AppError, AppResult, AppState};

use super::detection::ActionQuery;
use super::{parse_body, ApiEnvelope};

/// Network overview and read actions
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
) -> AppResult<Json<ApiEnvelope>> {
    let engine = &state.network;

    let data = match query.action.as_deref() {
        None => json!({
            "status": "running",
            "metrics": engine.metrics(),
        }),
        Some("flows") => json!(engine.flows()),
        Some("lateral-movement") => json!(engine.detect_lateral_movement()),
        Some("topology") => json!(engine.topology()),
        Some(other) => {
            return Err(AppError::BadRequest(format!("unknown action '{}'", other)));
        }
    };

    Ok(Json(ApiEnvelope::new(data)))
}

/// Create actions: flow
pub async fn create(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
    Json(body): Json<Value>,
) -> AppResult<Json<ApiEnvelope>> {
    let data = match query.action.as_deref() {
        Some("flow") => {
            let req: CreateFlow = parse_body(body)?;
            json!(state.network.record_flow(req))
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

/// Delete actions: flow
pub async fn remove(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
) -> AppResult<Json<ApiEnvelope>> {
    let data = match query.action.as_deref() {
        Some("flow") => {
            let id = query
                .id
                .ok_or_else(|| AppError::BadRequest("id parameter required".to_string()))?;
            if !state.network.remove_flow(id) {
                return Err(AppError::NotFound("Flow not found".to_string()));
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
