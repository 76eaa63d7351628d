//! AI offload bookkeeping. Records the delegation only; nothing is executed.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use mindstate_core::{NewAiOffload, OffloadStatus};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{required, run_blocking};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OffloadRequest {
    #[serde(default)]
    task_type: String,
    #[serde(default)]
    scope: String,
}

#[derive(Debug, Deserialize)]
pub struct AssistRequest {
    #[serde(default)]
    task: String,
    #[serde(default)]
    assistance_type: String,
}

fn task_advice(task_type: &str) -> &'static str {
    match task_type {
        "plan" => "AI will generate a structured plan. Review and adjust as needed.",
        "draft" => "AI will create an initial draft. Expect to edit and refine.",
        "refactor" => "AI will propose improvements. Verify they match your intent.",
        "summarize" => "AI will compress information. Check for loss of critical details.",
        "explore" => "AI will investigate options. Use findings to inform your decision.",
        _ => "Task delegated to AI. Monitor progress.",
    }
}

/// POST /api/v1/ai/offload
pub async fn offload(
    State(state): State<AppState>,
    payload: Result<Json<OffloadRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let draft = NewAiOffload {
        task_type: required("task_type", &req.task_type)?,
        scope: required("scope", &req.scope)?,
        status: OffloadStatus::Pending,
    };
    let record = run_blocking(&state.store, move |s| s.create_ai_offload(draft)).await?;

    Ok(Json(json!({
        "message": format!(
            "Offloaded to AI: {} [{}]. {}",
            record.task_type,
            record.scope,
            task_advice(&record.task_type)
        ),
        "id": record.id,
        "timestamp": Utc::now(),
    })))
}

/// POST /api/v1/ai/assist-for-execution
pub async fn assist_for_execution(
    State(state): State<AppState>,
    payload: Result<Json<AssistRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let task = required("task", &req.task)?;
    let assistance_type = required("assistance_type", &req.assistance_type)?;
    let draft = NewAiOffload {
        task_type: format!("assist:{}", assistance_type),
        scope: task.clone(),
        status: OffloadStatus::Processing,
    };
    let record = run_blocking(&state.store, move |s| s.create_ai_offload(draft)).await?;

    Ok(Json(json!({
        "message": format!(
            "AI assistance activated for: {}. Assistance type: {}. You lead, AI supports.",
            task, assistance_type
        ),
        "id": record.id,
        "timestamp": Utc::now(),
    })))
}
