// [[VIGIL]]/apps/watch-server/src/server/handlers.rs
// Purpose: API Handlers mapping the alert surface onto monitor and store.
// Architecture: API Layer
// Dependencies: Axum, Monitor, Store

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::models::Alert;
use crate::server::WatchState;
use crate::store::{AlertPatch, DeleteOutcome, NewAlert, StoreError, UpdateOutcome};

#[derive(serde::Serialize)]
pub struct HealthResponse {
    status: String,
    message: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "VIGIL Watch Server is running".to_string(),
    })
}

/// Full synthesis + ranking pipeline over current session data. The
/// persisted document is loaded read-only, only for its dismissed patterns;
/// persisted alerts are not merged here. Always a well-formed (possibly
/// empty) result, never an error envelope.
pub async fn list_alerts(State(state): State<Arc<WatchState>>) -> Json<serde_json::Value> {
    let dismissed = state.store.load().await.dismissed_patterns;
    let digest = state.monitor.scan(&dismissed, Utc::now()).await;

    Json(json!({
        "alerts": digest.alerts.iter().map(Alert::to_wire).collect::<Vec<_>>(),
        "total": digest.total,
        "criticalCount": digest.critical_count,
        "highCount": digest.high_count,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn get_alert(
    State(state): State<Arc<WatchState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    state
        .store
        .get(&id)
        .await
        .map(|alert| Json(alert.to_wire()))
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn update_alert(
    State(state): State<Arc<WatchState>>,
    Path(id): Path<String>,
    Json(patch): Json<AlertPatch>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.store.update(&id, patch).await {
        Ok(UpdateOutcome::Updated(alert)) => Ok(Json(json!({ "alert": alert.to_wire() }))),
        Ok(UpdateOutcome::Dismissed(pattern)) => {
            Ok(Json(json!({ "dismissedPattern": pattern })))
        }
        Err(e) => Err(store_error_status("update", &id, e)),
    }
}

pub async fn delete_alert(
    State(state): State<Arc<WatchState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.store.delete(&id).await {
        Ok(DeleteOutcome::Removed(alert)) => Ok(Json(json!({ "removed": alert.to_wire() }))),
        Ok(DeleteOutcome::Dismissed(pattern)) => {
            Ok(Json(json!({ "dismissedPattern": pattern })))
        }
        Err(e) => Err(store_error_status("delete", &id, e)),
    }
}

pub async fn create_alert(
    State(state): State<Arc<WatchState>>,
    Json(new): Json<NewAlert>,
) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    state
        .store
        .create(new)
        .await
        .map(|alert| (StatusCode::CREATED, Json(alert.to_wire())))
        .map_err(|e| {
            tracing::error!("Failed to create alert: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

fn store_error_status(op: &str, id: &str, e: StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        other => {
            tracing::error!("Alert {} failed for {}: {}", op, id, other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
