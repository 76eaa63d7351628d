//! Soft and hard resets.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use mindstate_core::ResetController;
use serde_json::{json, Value};

use super::run_blocking;
use crate::error::ApiError;
use crate::AppState;

/// POST /api/v1/mode/reset-soft
pub async fn reset_soft(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let report = run_blocking(&state.store, |s| ResetController::new(s).soft_reset()).await?;
    Ok(Json(json!({
        "message": "SOFT RESET complete. Active focus cleared, threads terminated, loops closed. Archives preserved. Fresh cognitive slate.",
        "reset_type": "soft",
        "report": report,
        "timestamp": Utc::now(),
    })))
}

/// POST /api/v1/mode/reset-hard
pub async fn reset_hard(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let report = run_blocking(&state.store, |s| ResetController::new(s).hard_reset()).await?;
    Ok(Json(json!({
        "message": "HARD RESET complete. All cognitive state wiped. Total restart. Use wisely.",
        "reset_type": "hard",
        "deleted": report.total(),
        "timestamp": Utc::now(),
    })))
}
