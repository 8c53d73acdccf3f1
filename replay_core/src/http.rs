//! HTTP transport for the live gateway. Every path accepts a POSTed frame.

use std::io;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::gateway::{GatewayError, LiveGateway};

pub fn router(gateway: Arc<LiveGateway>) -> Router {
    Router::new().fallback(ingest_frame).with_state(gateway)
}

/// Serve on an already bound listener until the runtime shuts down.
pub async fn serve(listener: TcpListener, gateway: Arc<LiveGateway>) -> io::Result<()> {
    let addr = listener.local_addr()?;
    info!(
        target: "match_inspector::gateway",
        %addr,
        synchronous_ack = gateway.config().synchronous_ack,
        "gateway.listening"
    );
    axum::serve(listener, router(gateway)).await
}

pub async fn bind_and_serve(gateway: Arc<LiveGateway>) -> io::Result<()> {
    let listener = TcpListener::bind(gateway.config().bind).await?;
    serve(listener, gateway).await
}

async fn ingest_frame(
    State(gateway): State<Arc<LiveGateway>>,
    method: Method,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({ "status": "error", "error": "frames must be POSTed" })),
        )
            .into_response();
    }

    // Ingestion blocks until the operator releases the frame.
    match tokio::task::spawn_blocking(move || gateway.ingest(&body)).await {
        Ok(Ok(reply)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            reply,
        )
            .into_response(),
        Ok(Err(GatewayError::Busy)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "busy" })),
        )
            .into_response(),
        Ok(Err(err @ GatewayError::Decode(_))) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => {
            error!(
                target: "match_inspector::gateway",
                error = %err,
                "ingest.task_failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "error": "ingest task failed" })),
            )
                .into_response()
        }
    }
}
