//! Emotion tagging and decompression.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use mindstate_core::{NewDecompressSession, NewEmotionalState};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{required, run_blocking};
use crate::error::ApiError;
use crate::AppState;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct TagEmotionRequest {
    #[serde(default)]
    label: String,
    #[serde(default)]
    source_guess: String,
}

#[derive(Debug, Deserialize)]
pub struct DecompressRequest {
    #[serde(default)]
    method: String,
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Deserialize)]
pub struct ListEmotionsQuery {
    #[serde(default)]
    limit: Option<usize>,
}

pub(crate) fn emotion_advice(label: &str) -> &'static str {
    match label {
        "angry" | "frustrated" => {
            "Acknowledgment is the first step. Consider what boundary was crossed."
        }
        "anxious" | "worried" => {
            "Noted. Is this about something in your control? If not, consider letting go."
        }
        "tired" => "Energy is finite. Prioritize rest when possible.",
        "overwhelmed" => "Too many open loops? Consider a reset or loop cleanup.",
        "resentful" => "Resentment often signals unmet needs. Worth examining.",
        _ => "Emotion logged. Self-awareness is valuable.",
    }
}

fn method_advice(method: &str) -> &'static str {
    match method {
        "walk" => "Movement helps process emotions. Don't rush.",
        "music" => "Let the music work. No need to solve anything right now.",
        "shower" => "Water and warmth are restorative. Be present.",
        "silence" => "Silence allows the mind to settle. Resist the urge to fill it.",
        _ => "Recovery time activated.",
    }
}

/// POST /api/v1/emotion/tag
pub async fn tag_emotion(
    State(state): State<AppState>,
    payload: Result<Json<TagEmotionRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let draft = NewEmotionalState {
        label: required("label", &req.label)?,
        source_guess: required("source_guess", &req.source_guess)?,
    };
    let tagged = run_blocking(&state.store, move |s| s.create_emotional_state(draft)).await?;

    Ok(Json(json!({
        "message": format!(
            "Emotional state tagged: {}. Possible source: {}. {}",
            tagged.label,
            tagged.source_guess,
            emotion_advice(&tagged.label)
        ),
        "id": tagged.id,
        "timestamp": Utc::now(),
    })))
}

/// GET /api/v1/emotion/list?limit=
pub async fn list_emotions(
    State(state): State<AppState>,
    query: Result<Query<ListEmotionsQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(q) = query?;
    let limit = q.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
    let states = run_blocking(&state.store, move |s| s.recent_emotional_states(limit)).await?;
    Ok(Json(json!({
        "total": states.len(),
        "states": states,
        "timestamp": Utc::now(),
    })))
}

/// POST /api/v1/emotion/decompress
pub async fn start_decompression(
    State(state): State<AppState>,
    payload: Result<Json<DecompressRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let draft = NewDecompressSession {
        method: required("method", &req.method)?,
        duration: required("duration", &req.duration)?,
    };
    let session = run_blocking(&state.store, move |s| s.create_decompress_session(draft)).await?;

    Ok(Json(json!({
        "message": format!(
            "Decompression session started: {} for {}. {}",
            session.method,
            session.duration,
            method_advice(&session.method)
        ),
        "id": session.id,
        "ends_at": session.ends_at,
        "timestamp": Utc::now(),
    })))
}
