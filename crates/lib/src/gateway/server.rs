//! Gateway HTTP server: webhook endpoint and health probe.

use crate::config::Config;
use crate::gateway::protocol::{CallbackAfterSendSingleMsgReq, CallbackResp, ErrorResp};
use crate::http::{usable_operation_id, CallContext, OPERATION_ID_HEADER};
use crate::relay::Relay;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Path the messaging platform calls after a single-chat message is sent.
pub const CALLBACK_PATH: &str = "/callbackAfterSendSingleMsgCommand";

/// Shared state for the gateway (config, relay, shutdown scope).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub relay: Relay,
    /// Parent of every invocation's cancellation token; cancelled on shutdown.
    pub shutdown: CancellationToken,
    /// Relay tasks spawned after acknowledgment; drained during graceful shutdown.
    pub tasks: TaskTracker,
}

impl GatewayState {
    pub fn new(config: Config, relay: Relay) -> Self {
        Self {
            config: Arc::new(config),
            relay,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }
}

/// Routes served by the gateway.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route(CALLBACK_PATH, post(callback_after_send_single_msg))
        .with_state(state)
}

/// Run the gateway until SIGINT/SIGTERM.
pub async fn run_gateway(config: Config) -> Result<()> {
    let client = reqwest::Client::builder()
        .build()
        .context("building http client")?;
    let relay = Relay::from_config(&config, client)?;
    log::info!("relaying for bot user {}", relay.bot_user_id());

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let state = GatewayState::new(config, relay);
    let shutdown = state.shutdown.clone();
    let tasks = state.tasks.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown, tasks.clone()))
        .await
        .context("gateway server exited")?;
    tasks.wait().await;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Cancels in-flight relay calls so their tasks finish promptly.
async fn shutdown_signal(shutdown: CancellationToken, tasks: TaskTracker) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
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
                log::error!("failed to install SIGTERM handler: {}", e);
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
    log::info!("shutdown signal received, cancelling {} in-flight relay(s)", tasks.len());
    shutdown.cancel();
    tasks.close();
}

/// Operation id for tracing: inbound header, else the callback's own `operationID`, else a fresh one.
/// A candidate that cannot be forwarded as a header value is skipped.
fn resolve_operation_id(headers: &HeaderMap, event: &CallbackAfterSendSingleMsgReq) -> String {
    headers
        .get(OPERATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(usable_operation_id)
        .or_else(|| usable_operation_id(&event.operation_id))
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// POST /callbackAfterSendSingleMsgCommand — decodes the callback, acknowledges at once and
/// runs the relay in the background. Only a malformed body is reported to the caller.
async fn callback_after_send_single_msg(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let event: CallbackAfterSendSingleMsgReq = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            log::error!("callback body invalid: {}", e);
            return (StatusCode::BAD_REQUEST, Json(ErrorResp::args(e.to_string()))).into_response();
        }
    };

    let operation_id = resolve_operation_id(&headers, &event);
    log::debug!(
        "[{}] callback {} -> {} (content type {})",
        operation_id,
        event.send_id,
        event.recv_id,
        i32::from(event.content_type)
    );
    let ctx = CallContext::new(Some(operation_id), state.shutdown.child_token());
    let relay = state.relay.clone();
    state.tasks.spawn(async move {
        relay.run(ctx, event).await;
    });

    (StatusCode::OK, Json(CallbackResp::success())).into_response()
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
    }))
}
