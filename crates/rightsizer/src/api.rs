//! HTTP API: health, metrics, invocation and pending change inspection

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use rightsizer_lib::{
    health::HealthRegistry,
    store::{list_pending_changes, load_pending_change},
    ChangeKey, PendingChange, Pipeline, ResourceKind, Trigger,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, pipeline: Arc<Pipeline>) -> Self {
        Self {
            health_registry,
            pipeline,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingList {
    pub pending: Vec<PendingChange>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub kind: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// 200 while operational, 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = if health.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Run a trigger synchronously; the HTTP status mirrors the result's status code
async fn invoke(State(state): State<Arc<AppState>>, Json(trigger): Json<Trigger>) -> Response {
    let result = state.pipeline.invoke(trigger).await;
    let status =
        StatusCode::from_u16(result.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(result)).into_response()
}

async fn list_pending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PendingQuery>,
) -> Response {
    let prefix = match query.kind.as_deref() {
        Some(raw) => match raw.parse::<ResourceKind>() {
            Ok(kind) => format!("{}/", kind),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        },
        None => String::new(),
    };

    match list_pending_changes(state.pipeline.store().as_ref(), &prefix).await {
        Ok(pending) => {
            let total = pending.len();
            Json(PendingList { pending, total }).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn get_pending(
    State(state): State<Arc<AppState>>,
    Path((kind, resource_id)): Path<(String, String)>,
) -> Response {
    let key = match ChangeKey::parse(&format!("{}/{}", kind, resource_id)) {
        Ok(key) => key,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match load_pending_change(state.pipeline.store().as_ref(), &key).await {
        Ok(Some(change)) => Json(change).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("no pending change at {}", key),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/v1/invoke", post(invoke))
        .route("/v1/pending", get(list_pending))
        .route("/v1/pending/:kind/*resource_id", get(get_pending))
        .with_state(state)
}

pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
