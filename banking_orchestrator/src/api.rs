//! REST API server for the banking analysis orchestrator
//!
//! Thin HTTP glue over [`Orchestrator::run_analysis`] and
//! [`Orchestrator::get_metrics`].

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::Orchestrator;
use crate::config::ServerConfig;
use crate::error::{AnalysisError, FailureKind};
use crate::Result;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalysisHttpRequest {
    pub customer_id: String,
    pub query: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<ApiError>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
    pub stage: Option<String>,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(error: &AnalysisError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                kind: error.kind(),
                message: error.to_string(),
                stage: error.stage().map(str::to_string),
            }),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// HTTP status for a failed run.
pub fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::Configuration | FailureKind::InvalidInput => StatusCode::BAD_REQUEST,
        FailureKind::StageFailure => StatusCode::BAD_GATEWAY,
        FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        FailureKind::External => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn run_analysis(
    State(state): State<ApiState>,
    Json(req): Json<AnalysisHttpRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(customer_id = %req.customer_id, "Received analysis request");

    match state
        .orchestrator
        .run_analysis(&req.customer_id, &req.query)
        .await
    {
        Ok(report) => (StatusCode::OK, Json(ApiResponse::success(report))),
        Err(e) => (status_for(e.kind()), Json(ApiResponse::error(&e))),
    }
}

async fn metrics(State(state): State<ApiState>) -> Json<ApiResponse> {
    Json(ApiResponse::success(state.orchestrator.get_metrics().await))
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/analysis", post(run_analysis))
        .route("/api/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn start_server(orchestrator: Arc<Orchestrator>, server: &ServerConfig) -> Result<()> {
    let addr = server.socket_addr()?;
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API Server listening on http://{}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
