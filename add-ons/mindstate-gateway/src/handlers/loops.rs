//! Open loops: authorize, close, kill, list.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use mindstate_core::{ClosureType, NewLoop, Priority, QueueType};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{optional, required, run_blocking};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthorizeLoopRequest {
    #[serde(default)]
    description: String,
    priority: Priority,
    queue: QueueType,
    #[serde(default)]
    owner: String,
}

#[derive(Debug, Deserialize)]
pub struct CloseLoopRequest {
    #[serde(default)]
    loop_id: String,
    closure_type: ClosureType,
    #[serde(default)]
    next_step: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KillLoopRequest {
    #[serde(default)]
    description: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListLoopsQuery {
    #[serde(default)]
    queue: Option<QueueType>,
}

pub(crate) fn closure_message(closure: ClosureType) -> &'static str {
    match closure {
        ClosureType::Done => "Loop CLOSED - commitment fulfilled. Cognitive load reduced.",
        ClosureType::Paused => "Loop PAUSED - intentionally set aside with next step noted.",
        ClosureType::Abandoned => "Loop ABANDONED - consciously dropped. This is a valid choice.",
    }
}

/// POST /api/v1/loop/authorize
pub async fn authorize_loop(
    State(state): State<AppState>,
    payload: Result<Json<AuthorizeLoopRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = payload?;
    let draft = NewLoop {
        description: required("description", &req.description)?,
        priority: req.priority,
        queue: req.queue,
        owner: required("owner", &req.owner)?,
    };
    let created = run_blocking(&state.store, move |s| s.create_loop(draft)).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Loop authorized and tracked. Cognitive load acknowledged.",
            "loop_id": created.id,
            "loop": created,
            "timestamp": Utc::now(),
        })),
    ))
}

/// POST /api/v1/loop/close
pub async fn close_loop(
    State(state): State<AppState>,
    payload: Result<Json<CloseLoopRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let loop_id = required("loop_id", &req.loop_id)?;
    let closure = req.closure_type;
    let next_step = optional(req.next_step);

    let closed = run_blocking(&state.store, move |s| s.close_loop(&loop_id, closure, next_step))
        .await?;

    Ok(Json(json!({
        "message": closure_message(closure),
        "loop_id": closed.id,
        "loop": closed,
        "timestamp": Utc::now(),
    })))
}

/// DELETE /api/v1/loop/kill
///
/// Zero matching open loops is a 404.
pub async fn kill_loop(
    State(state): State<AppState>,
    payload: Result<Json<KillLoopRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let description = required("description", &req.description)?;
    let reason = required("reason", &req.reason)?;

    let killed =
        run_blocking(&state.store, move |s| s.kill_loops_by_description(&description)).await?;
    if killed == 0 {
        return Err(ApiError::not_found(
            "No matching loops found",
            "No open loops matched the provided description",
        ));
    }

    Ok(Json(json!({
        "message": format!("Loop(s) KILLED. Mental bandwidth reclaimed. Reason: {}", reason),
        "killed": killed,
        "timestamp": Utc::now(),
    })))
}

/// GET /api/v1/loop/list?queue=
pub async fn list_loops(
    State(state): State<AppState>,
    query: Result<Query<ListLoopsQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(q) = query?;
    let loops = run_blocking(&state.store, move |s| s.list_open_loops(q.queue)).await?;
    Ok(Json(json!({
        "total": loops.len(),
        "loops": loops,
        "timestamp": Utc::now(),
    })))
}

/// GET /api/v1/loop/:id
pub async fn get_loop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let found = run_blocking(&state.store, move |s| s.get_loop(&id)).await?;
    match found {
        Some(l) => Ok(Json(json!({ "loop": l, "timestamp": Utc::now() }))),
        None => Err(ApiError::not_found(
            "Loop not found",
            "No loop exists with the provided ID",
        )),
    }
}
