//! Task and idea capture.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use mindstate_core::{NewIdea, NewTask, Priority};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{required, run_blocking};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestTaskRequest {
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    urgency: Priority,
    importance: Priority,
}

#[derive(Debug, Deserialize)]
pub struct IngestIdeaRequest {
    #[serde(default)]
    idea_summary: String,
    #[serde(default)]
    storage: String,
    #[serde(default)]
    action_now: bool,
}

/// Eisenhower quadrant advice: only `high` counts as urgent or important.
pub(crate) fn priority_advice(urgency: Priority, importance: Priority) -> &'static str {
    match (urgency == Priority::High, importance == Priority::High) {
        (true, true) => "CRITICAL: Schedule immediately or do now.",
        (true, false) => "URGENT but not critical: Consider delegating or timeboxing.",
        (false, true) => "IMPORTANT: Schedule dedicated time for this.",
        (false, false) => "LOW priority: Backlog or consider dropping.",
    }
}

/// POST /api/v1/ingest/task
pub async fn ingest_task(
    State(state): State<AppState>,
    payload: Result<Json<IngestTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = payload?;
    let draft = NewTask {
        description: required("description", &req.description)?,
        category: required("category", &req.category)?,
        urgency: req.urgency,
        importance: req.importance,
    };
    let task = run_blocking(&state.store, move |s| s.create_task(draft)).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!(
                "Task captured in category '{}'. {}",
                task.category,
                priority_advice(task.urgency, task.importance)
            ),
            "id": task.id,
            "timestamp": Utc::now(),
        })),
    ))
}

/// POST /api/v1/ingest/idea
pub async fn ingest_idea(
    State(state): State<AppState>,
    payload: Result<Json<IngestIdeaRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = payload?;
    let draft = NewIdea {
        summary: required("idea_summary", &req.idea_summary)?,
        storage: required("storage", &req.storage)?,
        action_now: req.action_now,
    };
    let idea = run_blocking(&state.store, move |s| s.create_idea(draft)).await?;

    let mut message = format!("Idea captured. Destination: {}.", idea.storage);
    if idea.action_now {
        message.push_str(" FLAG: Requires immediate attention.");
    } else {
        message.push_str(" It's safe in the system - let it go for now.");
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": message,
            "id": idea.id,
            "timestamp": Utc::now(),
        })),
    ))
}
