//! HTTP API for RUL predictions, diagnostics and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use rul_core::{
    ModelDescription, PredictionService, RawObservation, RulError, RulPrediction, Subsystem,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(service: PredictionService, request_timeout: Duration) -> Self {
        Self {
            service: Arc::new(service),
            request_timeout,
        }
    }
}

/// Failure surfaced to HTTP clients as `{"detail": "<Kind>: <message>"}`
#[derive(Debug)]
pub enum ApiError {
    Core(RulError),
    Timeout(Duration),
    Task(String),
}

impl From<RulError> for ApiError {
    fn from(e: RulError) -> Self {
        ApiError::Core(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(_) => StatusCode::BAD_REQUEST,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Core(e) => format!("{}: {}", e.kind(), e),
            ApiError::Timeout(limit) => {
                format!("Timeout: prediction exceeded {} ms", limit.as_millis())
            }
            ApiError::Task(msg) => format!("Internal: {}", msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<RawObservation>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub predictions: Vec<RulPrediction>,
}

/// Run synchronous prediction work off the async runtime, bounded by the
/// configured request timeout
async fn run_blocking<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&PredictionService) -> Result<T, RulError> + Send + 'static,
{
    let service = state.service.clone();
    let task = tokio::task::spawn_blocking(move || work(&service));

    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => result.map_err(ApiError::from),
        Ok(Err(join_error)) => {
            error!(error = %join_error, "Prediction task failed");
            Err(ApiError::Task(join_error.to_string()))
        }
        Err(_) => Err(ApiError::Timeout(state.request_timeout)),
    }
}

async fn predict_one(
    state: &AppState,
    subsystem: Subsystem,
    record: RawObservation,
) -> Result<Json<RulPrediction>, ApiError> {
    let prediction =
        run_blocking(state, move |service| service.predict(subsystem, &record)).await?;
    Ok(Json(prediction))
}

async fn predict_many(
    state: &AppState,
    subsystem: Subsystem,
    request: BatchRequest,
) -> Result<Json<BatchResponse>, ApiError> {
    let predictions = run_blocking(state, move |service| {
        service.predict_batch(subsystem, &request.items)
    })
    .await?;
    Ok(Json(BatchResponse { predictions }))
}

async fn predict_engine(
    State(state): State<Arc<AppState>>,
    Json(record): Json<RawObservation>,
) -> Result<Json<RulPrediction>, ApiError> {
    predict_one(&state, Subsystem::Propulsion, record).await
}

async fn predict_hydraulics(
    State(state): State<Arc<AppState>>,
    Json(record): Json<RawObservation>,
) -> Result<Json<RulPrediction>, ApiError> {
    predict_one(&state, Subsystem::Hydraulics, record).await
}

async fn predict_landing_gear(
    State(state): State<Arc<AppState>>,
    Json(record): Json<RawObservation>,
) -> Result<Json<RulPrediction>, ApiError> {
    predict_one(&state, Subsystem::LandingGear, record).await
}

async fn predict_engine_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    predict_many(&state, Subsystem::Propulsion, request).await
}

async fn predict_hydraulics_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    predict_many(&state, Subsystem::Hydraulics, request).await
}

async fn predict_landing_gear_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    predict_many(&state, Subsystem::LandingGear, request).await
}

/// Per-subsystem artifact diagnostics; load failures are reported inline
async fn model_info(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, ModelDescription>>, ApiError> {
    let described = run_blocking(&state, |service| Ok(service.describe_models())).await?;
    Ok(Json(described))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": SERVER_VERSION }))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return ApiError::Task(e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict/engine", post(predict_engine))
        .route("/predict/engine/batch", post(predict_engine_batch))
        .route("/predict/hydraulics", post(predict_hydraulics))
        .route("/predict/hydraulics/batch", post(predict_hydraulics_batch))
        .route("/predict/landing-gear", post(predict_landing_gear))
        .route("/predict/landing-gear/batch", post(predict_landing_gear_batch))
        .route("/model-info", get(model_info))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
