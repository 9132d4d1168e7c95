// =============================================================================
// REST API Endpoints — Axum 0.8
// =============================================================================
//
// All endpoints live under `/api/v1/`. Health is public; everything else
// requires a valid Bearer token checked via the `AuthBearer` extractor.
//
// Control endpoints do not touch the session directly. They are translated
// into `Command`s and handed to `Refresher::dispatch`, the same entry point
// the refresh loop's owner uses.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::AuthBearer;
use crate::binance::{RateLimitSnapshot, RateLimitTracker};
use crate::market_data::KlineSource;
use crate::refresh::Refresher;
use crate::types::{Command, TickOutcome};

/// Shared state handed to every handler.
pub struct ApiState<S> {
    pub refresher: Arc<Refresher<S>>,
    pub rate_limit: Arc<RateLimitTracker>,
}

// Derived Clone would demand `S: Clone`.
impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            refresher: Arc::clone(&self.refresher),
            rate_limit: Arc::clone(&self.rate_limit),
        }
    }
}

// =============================================================================
// Router construction
// =============================================================================

pub fn router<S: KlineSource>(state: ApiState<S>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health::<S>))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/session", get(session::<S>))
        .route("/api/v1/symbol", post(switch_symbol::<S>))
        .route("/api/v1/refresh", post(refresh::<S>))
        .route("/api/v1/shutdown", post(shutdown::<S>))
        // ── WebSocket ───────────────────────────────────────────────
        .route("/api/v1/ws", get(crate::api::ws::ws_handler::<S>))
        // ── Middleware & State ──────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
    running: bool,
    active_symbol: String,
    rate_limit: RateLimitSnapshot,
}

async fn health<S: KlineSource>(State(state): State<ApiState<S>>) -> impl IntoResponse {
    let store = state.refresher.store();
    Json(HealthResponse {
        status: "ok",
        state_version: store.version(),
        server_time: chrono::Utc::now().timestamp_millis(),
        running: !state.refresher.is_stopped(),
        active_symbol: store.snapshot().active_symbol.clone(),
        rate_limit: state.rate_limit.snapshot(),
    })
}

// =============================================================================
// Session snapshot (authenticated)
// =============================================================================

async fn session<S: KlineSource>(
    _auth: AuthBearer,
    State(state): State<ApiState<S>>,
) -> impl IntoResponse {
    Json(state.refresher.store().build_snapshot())
}

// =============================================================================
// Control (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct SymbolRequest {
    symbol: String,
}

#[derive(Serialize)]
struct CommandResponse {
    #[serde(flatten)]
    outcome: TickOutcome,
    state_version: u64,
}

async fn run_command<S: KlineSource>(state: &ApiState<S>, command: Command) -> Response {
    match state.refresher.dispatch(command).await {
        Ok(outcome) => Json(CommandResponse {
            outcome,
            state_version: state.refresher.store().version(),
        })
        .into_response(),
        Err(e) => {
            warn!(error = %e, "command rejected");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn switch_symbol<S: KlineSource>(
    _auth: AuthBearer,
    State(state): State<ApiState<S>>,
    Json(req): Json<SymbolRequest>,
) -> Response {
    let symbol = req.symbol.trim().to_uppercase();
    info!(%symbol, "symbol switch requested via API");
    run_command(&state, Command::SwitchSymbol(symbol)).await
}

async fn refresh<S: KlineSource>(_auth: AuthBearer, State(state): State<ApiState<S>>) -> Response {
    run_command(&state, Command::Refresh).await
}

async fn shutdown<S: KlineSource>(_auth: AuthBearer, State(state): State<ApiState<S>>) -> Response {
    info!("shutdown requested via API");
    run_command(&state, Command::Shutdown).await
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::api::auth::tests::{install_test_token, TEST_TOKEN};
    use crate::error::FetchError;
    use crate::refresh::tests::{series, ScriptedSource};
    use crate::runtime_config::RuntimeConfig;
    use crate::session::{Session, SessionStore};

    fn state(source: ScriptedSource) -> ApiState<ScriptedSource> {
        install_test_token();
        let config = RuntimeConfig {
            symbols: vec!["BTCUSDT".into(), "ETHUSDT".into()],
            ..RuntimeConfig::default()
        };
        let session = Session::new(config.symbols.clone(), "BTCUSDT", "1m").unwrap();
        let store = Arc::new(SessionStore::new(session));
        ApiState {
            refresher: Arc::new(Refresher::new(store, source, &config)),
            rate_limit: Arc::new(RateLimitTracker::default()),
        }
    }

    fn ok_source() -> ScriptedSource {
        ScriptedSource::always(Ok(series(&[1.0, 2.0, 3.0, 4.0])))
    }

    fn authed(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TEST_TOKEN}"));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = router(state(ok_source()));
        let req = Request::get("/api/v1/health").body(Body::empty()).unwrap();
        let (status, json) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["running"], true);
        assert_eq!(json["active_symbol"], "BTCUSDT");
        assert_eq!(json["rate_limit"]["weight_limit_1m"], 1200);
    }

    #[tokio::test]
    async fn session_requires_token() {
        let app = router(state(ok_source()));
        let req = Request::get("/api/v1/session").body(Body::empty()).unwrap();
        let (status, _) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let req = Request::get("/api/v1/session")
            .header(header::AUTHORIZATION, "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = send(app, authed("GET", "/api/v1/session", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["session"]["active_symbol"], "BTCUSDT");
        assert_eq!(json["stale"], false);
    }

    #[tokio::test]
    async fn refresh_commits_and_reports_outcome() {
        let st = state(ok_source());
        let app = router(st.clone());
        let (status, json) = send(app, authed("POST", "/api/v1/refresh", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outcome"], "committed");
        assert_eq!(json["state_version"], 2);
        assert_eq!(st.refresher.store().snapshot().closes(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn failed_refresh_reports_error_kind() {
        let app = router(state(ScriptedSource::always(Err(FetchError::Http {
            status: 503,
            body: "unavailable".into(),
        }))));
        let (status, json) = send(app, authed("POST", "/api/v1/refresh", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["error"]["kind"], "http");
        assert_eq!(json["error"]["status"], 503);
    }

    #[tokio::test]
    async fn switch_symbol_accepts_configured_symbol() {
        let st = state(ok_source());
        let app = router(st.clone());
        let body = serde_json::json!({ "symbol": "ethusdt" });
        let (status, json) = send(app, authed("POST", "/api/v1/symbol", Some(body))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outcome"], "committed");
        assert_eq!(st.refresher.store().snapshot().active_symbol, "ETHUSDT");
    }

    #[tokio::test]
    async fn switch_symbol_rejects_unknown_symbol() {
        let st = state(ok_source());
        let version = st.refresher.store().version();
        let app = router(st.clone());
        let body = serde_json::json!({ "symbol": "DOGEUSDT" });
        let (status, json) = send(app, authed("POST", "/api/v1/symbol", Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("DOGEUSDT"));
        assert_eq!(st.refresher.store().version(), version);
        assert!(st.refresher.source().calls.lock().is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_the_refresher() {
        let st = state(ok_source());
        let app = router(st.clone());
        let (status, json) = send(app.clone(), authed("POST", "/api/v1/shutdown", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outcome"], "stopped");
        assert!(st.refresher.is_stopped());

        let (_, json) = send(app, authed("POST", "/api/v1/refresh", None)).await;
        assert_eq!(json["outcome"], "stopped");
    }
}
