//! HTTP callback gateway for vitalbot.
//!
//! Receives DingTalk robot callbacks and hands each one to the
//! [`Dispatcher`]. Every request runs on its own task, so slow vision calls
//! for one sender do not hold up anyone else.
//!
//! Routes:
//! - `GET /health`
//! - `POST /dingtalk/callback`: robot callback JSON in, acknowledgement JSON out

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use tracing::{info, warn};

use vitalbot_channels::verify_callback_signature;
use vitalbot_config::GatewayConfig;
use vitalbot_core::ack::Ack;
use vitalbot_pipeline::Dispatcher;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub dispatcher: Arc<Dispatcher>,
    /// App secret used to check callback signatures; `None` skips the check
    pub signing_secret: Option<String>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/dingtalk/callback", post(callback_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(
    config: &GatewayConfig,
    state: SharedState,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(state);

    info!(addr = %addr, "Gateway listening for robot callbacks");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn callback_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Ack>) {
    if let Some(secret) = state.signing_secret.as_deref() {
        if !signature_valid(secret, &headers) {
            warn!("Callback rejected: missing or invalid signature");
            return (StatusCode::UNAUTHORIZED, Json(Ack::fail("invalid signature")));
        }
    }

    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Callback body is not JSON");
                return (StatusCode::BAD_REQUEST, Json(Ack::fail(format!("Error: {e}"))));
            }
        }
    };

    let ack = state.dispatcher.dispatch(payload.as_ref()).await;
    let status = if ack.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(ack))
}

fn signature_valid(secret: &str, headers: &HeaderMap) -> bool {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    match (header("timestamp"), header("sign")) {
        (Some(timestamp), Some(sign)) => verify_callback_signature(
            secret,
            timestamp,
            sign,
            chrono::Utc::now().timestamp_millis(),
        ),
        _ => false,
    }
}
