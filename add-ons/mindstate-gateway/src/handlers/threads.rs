//! Threads: spawn, background, terminate by rule, list.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use mindstate_core::{NewThread, ThreadMode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{required, run_blocking};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SpawnThreadRequest {
    #[serde(default)]
    thread_name: String,
    mode: ThreadMode,
    #[serde(default)]
    time_scope: String,
}

#[derive(Debug, Deserialize)]
pub struct BackgroundThreadRequest {
    #[serde(default)]
    thread_name: String,
    #[serde(default)]
    goal: String,
}

#[derive(Debug, Deserialize)]
pub struct TerminateThreadsRequest {
    #[serde(default)]
    rule: String,
}

fn mode_description(mode: ThreadMode) -> &'static str {
    match mode {
        ThreadMode::Foreground => "FOREGROUND - active attention required",
        ThreadMode::Background => "BACKGROUND - diffuse processing activated",
    }
}

/// POST /api/v1/thread/spawn
pub async fn spawn_thread(
    State(state): State<AppState>,
    payload: Result<Json<SpawnThreadRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = payload?;
    let draft = NewThread {
        name: required("thread_name", &req.thread_name)?,
        mode: req.mode,
        time_scope: required("time_scope", &req.time_scope)?,
        goal: None,
    };
    let thread = run_blocking(&state.store, move |s| s.create_thread(draft)).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Thread spawned: {}", mode_description(thread.mode)),
            "thread_id": thread.id,
            "thread": thread,
            "timestamp": Utc::now(),
        })),
    ))
}

/// POST /api/v1/thread/background
pub async fn background_thread(
    State(state): State<AppState>,
    payload: Result<Json<BackgroundThreadRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = payload?;
    let name = required("thread_name", &req.thread_name)?;
    let goal = required("goal", &req.goal)?;
    let thread =
        run_blocking(&state.store, move |s| s.create_background_thread(&name, &goal)).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!(
                "Background thread activated. Let your subconscious work on: {}",
                thread.goal.as_deref().unwrap_or_default()
            ),
            "thread_id": thread.id,
            "thread": thread,
            "timestamp": Utc::now(),
        })),
    ))
}

/// DELETE /api/v1/thread/terminate
///
/// Succeeds even when nothing matched; the count says how many were terminated.
pub async fn terminate_threads(
    State(state): State<AppState>,
    payload: Result<Json<TerminateThreadsRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let rule = required("rule", &req.rule)?;
    let reply_rule = rule.clone();
    let terminated =
        run_blocking(&state.store, move |s| s.terminate_threads_by_rule(&rule)).await?;

    Ok(Json(json!({
        "message": format!(
            "Thread cleanup complete. Terminated threads based on rule: {}",
            reply_rule
        ),
        "terminated": terminated,
        "timestamp": Utc::now(),
    })))
}

/// GET /api/v1/thread/list
pub async fn list_threads(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let threads = run_blocking(&state.store, |s| s.list_active_threads()).await?;
    Ok(Json(json!({
        "total": threads.len(),
        "threads": threads,
        "timestamp": Utc::now(),
    })))
}

/// GET /api/v1/thread/:id
pub async fn get_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let found = run_blocking(&state.store, move |s| s.get_thread(&id)).await?;
    match found {
        Some(t) => Ok(Json(json!({ "thread": t, "timestamp": Utc::now() }))),
        None => Err(ApiError::not_found(
            "Thread not found",
            "No thread exists with the provided ID",
        )),
    }
}
