//! HTTP transport: one JSON-RPC message per `POST`.
//!
//! Request headers become the [`RequestContext`] headers. Rejections carry
//! their status in the error data, and the HTTP status mirrors it.

use crate::protocol::handler::{Dispatcher, Handler, RequestContext};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the router serving `POST /` and `POST /mcp`.
pub fn router<H: Handler + 'static>(handler: Arc<H>) -> Router {
    let dispatcher = Arc::new(Dispatcher::new(handler));

    Router::new()
        .route("/", post(handle_rpc::<H>))
        .route("/mcp", post(handle_rpc::<H>))
        .route("/health", get(health))
        .with_state(dispatcher)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

/// Serve until ctrl-c.
pub async fn serve<H: Handler + 'static>(
    handler: Arc<H>,
    listener: TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    info!(address = %addr, "HTTP transport listening");

    axum::serve(listener, router(handler))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP transport stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health() -> &'static str {
    "OK"
}

async fn handle_rpc<H: Handler + 'static>(
    State(dispatcher): State<Arc<Dispatcher<H>>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Failed to parse JSON-RPC body: {}", e);
            let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    let ctx = context_from_headers(RequestContext::new(&request), &headers);
    let is_notification = request.is_notification();
    let response = dispatcher.dispatch(request, &ctx).await;

    if is_notification {
        return StatusCode::ACCEPTED.into_response();
    }

    let status = rejection_status(&response).unwrap_or(StatusCode::OK);
    debug!(status = status.as_u16(), "Responding");
    (status, Json(response)).into_response()
}

/// Real headers win over any `_meta.headers` in the body.
fn context_from_headers(mut ctx: RequestContext, headers: &HeaderMap) -> RequestContext {
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            ctx = ctx.with_header(name.as_str(), value);
        }
    }
    ctx
}

fn rejection_status(response: &JsonRpcResponse) -> Option<StatusCode> {
    let status = response
        .error
        .as_ref()?
        .data
        .as_ref()?
        .get("status")
        .and_then(Value::as_u64)?;
    u16::try_from(status)
        .ok()
        .and_then(|s| StatusCode::from_u16(s).ok())
}
