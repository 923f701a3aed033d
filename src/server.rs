//! ==============================================================================
//! server.rs - http gateway
//! ==============================================================================
//!
//! purpose:
//!     thin layer over the coordinator: parse and validate the request,
//!     submit it, wait for the reply, render it. nothing here touches the
//!     filesystem.
//!
//! endpoints:
//!     - GET  /readings?sensor_id=N   full history of one sensor, by timestamp
//!     - POST /readings               append a {"sensor_id", "readings"} batch (201)
//!     - GET  /hello?name=X           greeting, handy for smoke tests
//!     - GET  /health                 200 while the server is up
//!
//!     error bodies are plain text with a trailing newline and keep the
//!     wording existing clients already match on. a repeated query parameter
//!     uses its first value.
//!
//! relationships:
//!     - used by: main.rs (serves build_router)
//!     - uses: coordinator.rs (every read and write), codec.rs (validation)
//!
//! ==============================================================================

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::codec;
use crate::coordinator::Coordinator;
use crate::domain::ReadingBatch;
use crate::error::{SubmitError, ValidationError};

/// Errors returned to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required query parameter is absent or empty.
    #[error("Error: {0} not provided")]
    MissingParam(&'static str),

    #[error("invalid sensor id")]
    InvalidSensorId,

    /// Body is not a decodable reading batch.
    #[error("Error: malformed request")]
    MalformedBody(#[source] serde_json::Error),

    /// Batch decoded but cannot be stored as well-formed lines.
    #[error("Error: malformed request")]
    InvalidBatch(#[from] ValidationError),

    #[error("Error Writing")]
    Write(#[source] SubmitError),

    #[error("Error Reading")]
    Read(#[source] SubmitError),

    #[error("Error: storage unavailable")]
    Unavailable,

    #[error("Undefined route")]
    UndefinedRoute,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Read(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            // write failures keep the legacy 400
            _ => StatusCode::BAD_REQUEST,
        };

        (status, format!("{}\n", self)).into_response()
    }
}

impl ApiError {
    fn from_read(err: SubmitError) -> Self {
        match err {
            SubmitError::Stopped => ApiError::Unavailable,
            other => ApiError::Read(other),
        }
    }

    fn from_write(err: SubmitError) -> Self {
        match err {
            SubmitError::Stopped => ApiError::Unavailable,
            other => ApiError::Write(other),
        }
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(coordinator: Coordinator) -> Router {
    Router::new()
        .route(
            "/readings",
            get(get_readings)
                .post(post_readings)
                .fallback(undefined_route),
        )
        .route("/hello", get(hello_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(coordinator)
}

/// query parameters in request order, repeats included
type QueryPairs = Vec<(String, String)>;

/// first non-empty value of a query parameter; later repeats are ignored
fn first_param<'a>(pairs: &'a [(String, String)], key: &'static str) -> Result<&'a str, ApiError> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingParam(key))
}

/// `GET /readings?sensor_id=N`
async fn get_readings(
    State(coordinator): State<Coordinator>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<ReadingBatch>, ApiError> {
    let raw = first_param(&pairs, "sensor_id")?;
    let sensor_id: u32 = raw.parse().map_err(|_| ApiError::InvalidSensorId)?;

    let batch = coordinator.submit_read(sensor_id).await.map_err(|e| {
        error!(sensor_id, error = %e, "read request failed");
        ApiError::from_read(e)
    })?;

    Ok(Json(batch))
}

/// `POST /readings` with a JSON batch
async fn post_readings(
    State(coordinator): State<Coordinator>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let batch: ReadingBatch = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "rejecting undecodable batch");
        ApiError::MalformedBody(e)
    })?;
    codec::validate(&batch.readings).inspect_err(|e| {
        debug!(sensor_id = batch.sensor_id, error = %e, "rejecting invalid batch");
    })?;

    let sensor_id = batch.sensor_id;
    let count = batch.readings.len();
    coordinator.submit_write(batch).await.map_err(|e| {
        error!(sensor_id, error = %e, "write request failed");
        ApiError::from_write(e)
    })?;

    debug!(sensor_id, count, "stored batch");
    Ok(StatusCode::CREATED)
}

async fn undefined_route() -> ApiError {
    ApiError::UndefinedRoute
}

/// `GET /hello?name=X`
async fn hello_handler(Query(pairs): Query<QueryPairs>) -> Result<Json<serde_json::Value>, ApiError> {
    let name = first_param(&pairs, "name")?;

    Ok(Json(serde_json::json!({ "message": format!("Hello {}", name) })))
}

/// `GET /health`
async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
