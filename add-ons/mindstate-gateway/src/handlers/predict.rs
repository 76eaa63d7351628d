//! Scenario simulations.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use mindstate_core::{NewPrediction, PredictionDepth};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{required, run_blocking};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RunPredictionRequest {
    #[serde(default)]
    scenario: String,
    #[serde(default)]
    time_horizon: String,
    depth: PredictionDepth,
}

#[derive(Debug, Deserialize)]
pub struct StopPredictionRequest {
    #[serde(default)]
    topic: String,
}

fn depth_advice(depth: PredictionDepth) -> &'static str {
    match depth {
        PredictionDepth::Deep => "Deep analysis mode - allocate significant mental resources.",
        PredictionDepth::Medium => "Standard analysis - balanced approach.",
        PredictionDepth::Low => "Quick scan - don't over-invest in this.",
    }
}

/// POST /api/v1/predict/run
pub async fn run_prediction(
    State(state): State<AppState>,
    payload: Result<Json<RunPredictionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(req) = payload?;
    let draft = NewPrediction {
        scenario: required("scenario", &req.scenario)?,
        time_horizon: required("time_horizon", &req.time_horizon)?,
        depth: req.depth,
    };
    let prediction = run_blocking(&state.store, move |s| s.create_prediction(draft)).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!(
                "Prediction running: {} [{}]. {}",
                prediction.scenario,
                prediction.time_horizon,
                depth_advice(prediction.depth)
            ),
            "prediction_id": prediction.id,
            "prediction": prediction,
            "timestamp": Utc::now(),
        })),
    ))
}

/// DELETE /api/v1/predict/stop
///
/// Zero matching running predictions is a 404.
pub async fn stop_prediction(
    State(state): State<AppState>,
    payload: Result<Json<StopPredictionRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let topic = required("topic", &req.topic)?;
    let reply_topic = topic.clone();
    let stopped =
        run_blocking(&state.store, move |s| s.stop_predictions_by_topic(&topic)).await?;
    if stopped == 0 {
        return Err(ApiError::not_found(
            "No matching predictions found",
            "No running predictions matched the provided topic",
        ));
    }

    Ok(Json(json!({
        "message": format!(
            "Prediction(s) STOPPED for topic: {}. Mental simulation halted.",
            reply_topic
        ),
        "stopped": stopped,
        "timestamp": Utc::now(),
    })))
}
