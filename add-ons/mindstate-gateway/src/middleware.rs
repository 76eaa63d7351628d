//! Request logging and panic recovery.

use std::any::Any;
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tag each request with a UUID, echo it in `X-Request-ID` and log
/// `[id8] METHOD PATH STATUS LATENCY` when the response is ready.
pub async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let status = response.status();
    let latency = start.elapsed();
    let short_id = &request_id[..8];
    if status.is_server_error() {
        tracing::error!("[{}] {} {} {} {:?}", short_id, method, path, status.as_u16(), latency);
    } else if status.is_client_error() {
        tracing::warn!("[{}] {} {} {} {:?}", short_id, method, path, status.as_u16(), latency);
    } else {
        tracing::info!("[{}] {} {} {} {:?}", short_id, method, path, status.as_u16(), latency);
    }
    response
}

/// `CatchPanicLayer` handler: the panic becomes a JSON 500.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(details = %details, "handler panicked");

    let body = json!({
        "error": "Internal server error",
        "details": "An unexpected error occurred",
        "timestamp": chrono::Utc::now(),
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
