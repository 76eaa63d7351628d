//! Focus and dashboard status.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use mindstate_core::{CognitiveStatus, FocusLock, NewFocus, StatusAggregator};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{required, run_blocking};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SetFocusRequest {
    #[serde(default)]
    task_name: String,
    #[serde(default)]
    duration: String,
    #[serde(default)]
    success_criteria: String,
}

#[derive(Debug, Deserialize)]
pub struct LockFocusRequest {
    #[serde(default)]
    task_name: String,
    #[serde(default)]
    timebox: String,
    #[serde(default)]
    fallback: String,
}

/// POST /api/v1/focus/set
pub async fn set_focus(
    State(state): State<AppState>,
    payload: Result<Json<SetFocusRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let draft = NewFocus {
        task_name: required("task_name", &req.task_name)?,
        duration: required("duration", &req.duration)?,
        success_criteria: required("success_criteria", &req.success_criteria)?,
    };
    let focus = run_blocking(&state.store, move |s| s.set_focus(draft)).await?;
    tracing::info!(focus_id = %focus.id, ends_at = %focus.ends_at, "focus set");

    Ok(Json(json!({
        "message": "Focus set successfully. Deep work mode activated.",
        "focus": focus,
        "timestamp": Utc::now(),
    })))
}

/// POST /api/v1/focus/lock
pub async fn lock_focus(
    State(state): State<AppState>,
    payload: Result<Json<LockFocusRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let lock = FocusLock {
        task_name: required("task_name", &req.task_name)?,
        timebox: required("timebox", &req.timebox)?,
        fallback: required("fallback", &req.fallback)?,
    };
    let focus = run_blocking(&state.store, move |s| s.lock_focus(lock)).await?;

    Ok(Json(json!({
        "message": "Focus LOCKED. Do not context switch until timebox expires.",
        "focus": focus,
        "timestamp": Utc::now(),
    })))
}

/// GET /api/v1/focus/current
pub async fn current_focus(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let focus = run_blocking(&state.store, |s| s.current_focus()).await?;
    let body = match focus {
        Some(focus) => json!({
            "message": "Current focus retrieved.",
            "focus": focus,
            "timestamp": Utc::now(),
        }),
        None => json!({
            "message": "No active focus. Set one to begin deep work.",
            "timestamp": Utc::now(),
        }),
    };
    Ok(Json(body))
}

/// DELETE /api/v1/focus/clear
pub async fn clear_focus(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let cleared = run_blocking(&state.store, |s| s.clear_focus()).await?;
    Ok(Json(json!({
        "message": "Focus cleared. Attention released.",
        "cleared": cleared,
        "timestamp": Utc::now(),
    })))
}

/// GET /api/v1/dashboard/status
pub async fn dashboard_status(
    State(state): State<AppState>,
) -> Result<Json<CognitiveStatus>, ApiError> {
    let status = run_blocking(&state.store, |s| StatusAggregator::new(s).status()).await?;
    Ok(Json(status))
}
