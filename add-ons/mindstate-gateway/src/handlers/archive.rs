//! Append-only archive.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use mindstate_core::NewArchive;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{optional, required, run_blocking};
use crate::error::ApiError;
use crate::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct CommitArchiveRequest {
    #[serde(default)]
    object: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    lesson: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListArchivesQuery {
    #[serde(default)]
    limit: Option<usize>,
}

/// POST /api/v1/archive/commit
pub async fn commit_archive(
    State(state): State<AppState>,
    payload: Result<Json<CommitArchiveRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let draft = NewArchive {
        object: required("object", &req.object)?,
        summary: required("summary", &req.summary)?,
        lesson: optional(req.lesson),
    };
    let archive = run_blocking(&state.store, move |s| s.create_archive(draft)).await?;

    let mut message = format!("Archived: {}. Summary recorded.", archive.object);
    if archive.lesson.is_some() {
        message.push_str(" Lesson captured for future reference.");
    }

    Ok(Json(json!({
        "message": message,
        "archive_id": archive.id,
        "timestamp": Utc::now(),
    })))
}

/// GET /api/v1/archive/list?limit=
pub async fn list_archives(
    State(state): State<AppState>,
    query: Result<Query<ListArchivesQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(q) = query?;
    let limit = q.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
    let archives = run_blocking(&state.store, move |s| s.list_archives(limit)).await?;
    Ok(Json(json!({
        "total": archives.len(),
        "archives": archives,
        "timestamp": Utc::now(),
    })))
}

/// GET /api/v1/archive/:id
pub async fn get_archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let found = run_blocking(&state.store, move |s| s.get_archive(&id)).await?;
    match found {
        Some(a) => Ok(Json(json!({ "archive": a, "timestamp": Utc::now() }))),
        None => Err(ApiError::not_found(
            "Archive not found",
            "No archive exists with the provided ID",
        )),
    }
}
