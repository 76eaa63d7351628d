//! Mindstate gateway: JSON HTTP surface over the cognitive state store.
//!
//! Configuration comes from `config/gateway.toml` and `MINDSTATE__*` variables
//! (see `mindstate_core::GatewayConfig`). `.env` is loaded first when present.

mod error;
mod handlers;
mod middleware;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, Method};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use mindstate_core::{GatewayConfig, StateStore};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use handlers::{ai, archive, emotion, focus, ingest, loops, mode, predict, threads};

#[derive(Clone)]
pub(crate) struct AppState {
    pub config: Arc<GatewayConfig>,
    pub store: Arc<StateStore>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = match GatewayConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = match StateStore::open(&config.database_path) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(path = %config.database_path, error = %e, "failed to open state store");
            std::process::exit(1);
        }
    };

    let addr = config.bind_addr();
    let state = AppState {
        config: Arc::new(config),
        store: Arc::new(store),
    };
    let app = build_app(state.clone());

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(
        %addr,
        env = %state.config.env,
        database = %state.config.database_path,
        "{} listening",
        state.config.app_name
    );
    if !state.config.is_production() {
        tracing::info!("health check: http://{}/health", addr);
    }

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
    tracing::info!("gateway stopped");
}

pub(crate) fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(middleware::REQUEST_ID_HEADER)])
        .max_age(Duration::from_secs(86_400));
    let timeout = TimeoutLayer::new(Duration::from_secs(state.config.request_timeout_secs));

    let api = Router::new()
        // Focus
        .route("/focus/set", post(focus::set_focus))
        .route("/focus/lock", post(focus::lock_focus))
        .route("/focus/current", get(focus::current_focus))
        .route("/focus/clear", delete(focus::clear_focus))
        .route("/dashboard/status", get(focus::dashboard_status))
        // Loops
        .route("/loop/authorize", post(loops::authorize_loop))
        .route("/loop/close", post(loops::close_loop))
        .route("/loop/kill", delete(loops::kill_loop))
        .route("/loop/list", get(loops::list_loops))
        .route("/loop/:id", get(loops::get_loop))
        // Threads
        .route("/thread/spawn", post(threads::spawn_thread))
        .route("/thread/background", post(threads::background_thread))
        .route("/thread/terminate", delete(threads::terminate_threads))
        .route("/thread/list", get(threads::list_threads))
        .route("/thread/:id", get(threads::get_thread))
        // Capture
        .route("/ingest/task", post(ingest::ingest_task))
        .route("/ingest/idea", post(ingest::ingest_idea))
        .route("/archive/commit", post(archive::commit_archive))
        .route("/archive/list", get(archive::list_archives))
        .route("/archive/:id", get(archive::get_archive))
        // Simulation and emotion
        .route("/predict/run", post(predict::run_prediction))
        .route("/predict/stop", delete(predict::stop_prediction))
        .route("/emotion/tag", post(emotion::tag_emotion))
        .route("/emotion/list", get(emotion::list_emotions))
        .route("/emotion/decompress", post(emotion::start_decompression))
        // AI
        .route("/ai/offload", post(ai::offload))
        .route("/ai/assist-for-execution", post(ai::assist_for_execution))
        // Mode
        .route("/mode/reset-soft", post(mode::reset_soft))
        .route("/mode/reset-hard", post(mode::reset_hard));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(timeout)
        .layer(CatchPanicLayer::custom(middleware::panic_response))
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::log_requests))
}

async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": state.config.app_name,
        "timestamp": chrono::Utc::now(),
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_app() -> (tempfile::TempDir, AppState, Router) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("gateway.sqlite")).unwrap();
        let state = AppState {
            config: Arc::new(GatewayConfig {
                app_name: "Test Mindstate".to_string(),
                ..GatewayConfig::default()
            }),
            store: Arc::new(store),
        };
        let app = build_app(state.clone());
        (dir, state, app)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_service_and_request_id() {
        let (_dir, _state, app) = test_app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(middleware::REQUEST_ID_HEADER));
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["status"], "healthy");
        assert_eq!(v["service"], "Test Mindstate");
    }

    #[tokio::test]
    async fn set_focus_then_dashboard_shows_it() {
        let (_dir, _state, app) = test_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/focus/set",
            Some(json!({"task_name": "write essay", "duration": "25m", "success_criteria": "800 words"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["focus"]["task_name"], "write essay");
        assert_eq!(body["focus"]["is_locked"], false);

        let (status, body) = send(&app, Method::GET, "/api/v1/dashboard/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_focus"], "write essay");
        assert_eq!(body["energy_level"], "high");
        assert_eq!(body["emotional_load"], "low");
    }

    #[tokio::test]
    async fn set_focus_validation_errors() {
        let (_dir, _state, app) = test_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/focus/set",
            Some(json!({"task_name": "x", "duration": "bogus", "success_criteria": "y"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid duration format");
        assert!(body["timestamp"].is_string());

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/focus/set",
            Some(json!({"task_name": "  ", "duration": "25m", "success_criteria": "y"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/focus/set")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn current_focus_omits_focus_when_empty() {
        let (_dir, _state, app) = test_app();
        let (status, body) = send(&app, Method::GET, "/api/v1/focus/current", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("focus").is_none());
    }

    #[tokio::test]
    async fn lock_focus_without_existing_focus_creates_locked_row() {
        let (_dir, _state, app) = test_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/focus/lock",
            Some(json!({"task_name": "taxes", "timebox": "90m", "fallback": "call accountant"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["focus"]["is_locked"], true);
        assert_eq!(body["focus"]["duration"], "90m");

        let (_, status_body) = send(&app, Method::GET, "/api/v1/dashboard/status", None).await;
        assert_eq!(status_body["focus_locked"], true);
    }

    #[tokio::test]
    async fn loop_lifecycle_over_http() {
        let (_dir, _state, app) = test_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/loop/authorize",
            Some(json!({"description": "email follow-up", "priority": "high", "queue": "action", "owner": "me"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let loop_id = body["loop_id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, Method::GET, &format!("/api/v1/loop/{}", loop_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["loop"]["status"], "open");

        let close = json!({"loop_id": loop_id, "closure_type": "paused", "next_step": "wait for reply"});
        let (status, body) = send(&app, Method::POST, "/api/v1/loop/close", Some(close.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("PAUSED"));
        assert_eq!(body["loop"]["closure_type"], "paused");

        let (status, body) = send(&app, Method::POST, "/api/v1/loop/close", Some(close)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Already closed");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/loop/close",
            Some(json!({"loop_id": "missing", "closure_type": "done"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::GET, "/api/v1/loop/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_enum_values_are_rejected() {
        let (_dir, _state, app) = test_app();
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/loop/authorize",
            Some(json!({"description": "x", "priority": "urgent", "queue": "action", "owner": "me"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/api/v1/loop/list?queue=inbox", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn kill_loop_then_not_found() {
        let (_dir, _state, app) = test_app();
        send(
            &app,
            Method::POST,
            "/api/v1/loop/authorize",
            Some(json!({"description": "Email follow-up", "priority": "medium", "queue": "action", "owner": "me"})),
        )
        .await;
        let kill = json!({"description": "email", "reason": "out of my control"});

        let (status, body) = send(&app, Method::DELETE, "/api/v1/loop/kill", Some(kill.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["killed"], 1);
        assert!(body["message"].as_str().unwrap().ends_with("out of my control"));

        let (status, body) = send(&app, Method::DELETE, "/api/v1/loop/kill", Some(kill)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No matching loops found");

        let (_, list) = send(&app, Method::GET, "/api/v1/loop/list", None).await;
        assert_eq!(list["total"], 0);
    }

    #[tokio::test]
    async fn terminate_succeeds_with_zero_matches() {
        let (_dir, _state, app) = test_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/thread/spawn",
            Some(json!({"thread_name": "launch", "mode": "foreground", "time_scope": "this week"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["message"].as_str().unwrap().contains("FOREGROUND"));

        let (status, body) = send(
            &app,
            Method::DELETE,
            "/api/v1/thread/terminate",
            Some(json!({"rule": "nothing matches this"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["terminated"], 0);

        let (status, body) = send(
            &app,
            Method::DELETE,
            "/api/v1/thread/terminate",
            Some(json!({"rule": "LAUNCH"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["terminated"], 1);
    }

    #[tokio::test]
    async fn stop_prediction_zero_matches_is_not_found() {
        let (_dir, _state, app) = test_app();
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/predict/run",
            Some(json!({"scenario": "salary talk", "time_horizon": "1 week", "depth": "deep"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(&app, Method::DELETE, "/api/v1/predict/stop", Some(json!({"topic": "salary"}))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::DELETE, "/api/v1/predict/stop", Some(json!({"topic": "salary"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn soft_reset_preserves_archive() {
        let (_dir, state, app) = test_app();
        send(
            &app,
            Method::POST,
            "/api/v1/focus/set",
            Some(json!({"task_name": "a", "duration": "1h", "success_criteria": "b"})),
        )
        .await;
        send(
            &app,
            Method::POST,
            "/api/v1/thread/background",
            Some(json!({"thread_name": "novel", "goal": "find the ending"})),
        )
        .await;
        let (_, archived) = send(
            &app,
            Method::POST,
            "/api/v1/archive/commit",
            Some(json!({"object": "Q1", "summary": "done", "lesson": "start earlier"})),
        )
        .await;
        assert!(archived["message"].as_str().unwrap().contains("Lesson captured"));
        let archive_id = archived["archive_id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, Method::POST, "/api/v1/mode/reset-soft", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reset_type"], "soft");

        let (_, dash) = send(&app, Method::GET, "/api/v1/dashboard/status", None).await;
        assert!(dash.get("current_focus").is_none());
        assert_eq!(dash["background_threads"], json!([]));
        assert_eq!(dash["open_loops_estimate"], 0);

        let (status, body) = send(&app, Method::GET, &format!("/api/v1/archive/{}", archive_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["archive"]["lesson"], "start earlier");
        assert_eq!(state.store.count_archives().unwrap(), 1);
    }

    #[tokio::test]
    async fn hard_reset_wipes_everything() {
        let (_dir, state, app) = test_app();
        send(
            &app,
            Method::POST,
            "/api/v1/ingest/task",
            Some(json!({"description": "x", "category": "y", "urgency": "high", "importance": "high"})),
        )
        .await;
        send(
            &app,
            Method::POST,
            "/api/v1/ai/offload",
            Some(json!({"task_type": "draft", "scope": "blog post"})),
        )
        .await;

        let (status, body) = send(&app, Method::POST, "/api/v1/mode/reset-hard", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reset_type"], "hard");
        assert_eq!(body["deleted"], 2);
        for kind in mindstate_core::EntityKind::ALL {
            assert_eq!(state.store.count(kind).unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn capture_endpoints_reply_with_advice() {
        let (_dir, _state, app) = test_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/ingest/task",
            Some(json!({"description": "fix prod", "category": "work", "urgency": "high", "importance": "high"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["message"].as_str().unwrap().contains("CRITICAL"));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/ingest/idea",
            Some(json!({"idea_summary": "garden app", "storage": "notes", "action_now": true})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["message"].as_str().unwrap().contains("FLAG"));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/emotion/tag",
            Some(json!({"label": "tired", "source_guess": "late night"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("Energy is finite"));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/emotion/decompress",
            Some(json!({"method": "walk", "duration": "20m"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["ends_at"].is_string());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/ai/assist-for-execution",
            Some(json!({"task": "migration", "assistance_type": "review"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("You lead, AI supports."));

        let (_, emotions) = send(&app, Method::GET, "/api/v1/emotion/list?limit=5", None).await;
        assert_eq!(emotions["total"], 1);
    }
}
