use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use convertino_core::converter::Preset;
use convertino_core::{Config, OutputFormat};

use crate::metrics::encode_metrics;
use crate::state::AppState;

/// Error body returned by every API error.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by API handlers.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Build an `ApiError` with the given status and message.
pub fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config().clone())
}

#[derive(Debug, Serialize)]
pub struct FormatInfo {
    /// Value accepted by the `format` form field.
    pub format: OutputFormat,
    pub extension: &'static str,
    pub audio_only: bool,
}

#[derive(Debug, Serialize)]
pub struct FormatsResponse {
    pub formats: Vec<FormatInfo>,
}

/// GET /api/v1/formats
///
/// Output formats offered by the converter, in presentation order.
pub async fn list_formats(State(state): State<Arc<AppState>>) -> Json<FormatsResponse> {
    let formats = state
        .orchestrator()
        .converter()
        .supported_output_formats()
        .iter()
        .map(|format| FormatInfo {
            format: *format,
            extension: format.extension(),
            audio_only: format.is_audio_only(),
        })
        .collect();

    Json(FormatsResponse { formats })
}

#[derive(Debug, Serialize)]
pub struct PresetsResponse {
    pub presets: Vec<Preset>,
}

/// GET /api/v1/presets
pub async fn list_presets(State(state): State<Arc<AppState>>) -> Json<PresetsResponse> {
    Json(PresetsResponse {
        presets: state.presets().presets().to_vec(),
    })
}

/// GET /metrics
///
/// Prometheus text exposition format.
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
