//! Batch conversion and download API handlers.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use convertino_core::converter::ParamOverrides;
use convertino_core::{
    pack_archive, BatchRequest, ConversionBatch, ConversionResult, FailureKind, OutputFormat,
    UploadedFile, ARCHIVE_CONTENT_TYPE, ARCHIVE_NAME,
};

use super::handlers::{api_error, ApiError};
use super::routes::API_PREFIX;
use crate::state::AppState;
use crate::store::StoredBatch;

/// Progress events buffered between the orchestrator and the broadcaster.
const PROGRESS_BUFFER: usize = 64;

/// Name used for a file part that carries no file name.
const UNNAMED_UPLOAD: &str = "upload";

// ============================================================================
// Request/Response types
// ============================================================================

/// Fields of a convert form, as received.
#[derive(Debug, Default)]
pub struct ConvertForm {
    pub files: Vec<UploadedFile>,
    pub format: Option<String>,
    pub preset: Option<String>,
    pub overrides: ParamOverrides,
    /// Client tag for WebSocket progress, sent as the `batch_id` part.
    pub progress_id: Option<String>,
}

/// Outcome of a batch, as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub format: OutputFormat,
    pub created_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// One entry per uploaded file, in upload order.
    pub results: Vec<FileReport>,
    /// Present when at least one file converted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileReport {
    Success {
        index: usize,
        output_name: String,
        size_bytes: usize,
        download_url: String,
    },
    Failure {
        index: usize,
        input_name: String,
        kind: FailureKind,
        /// ffmpeg's diagnostic output, verbatim.
        diagnostic: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveLink {
    pub name: String,
    pub download_url: String,
}

impl BatchReport {
    pub fn new(batch: &ConversionBatch, created_at: DateTime<Utc>) -> Self {
        let results = batch
            .results
            .iter()
            .enumerate()
            .map(|(index, result)| match result {
                ConversionResult::Success(file) => FileReport::Success {
                    index,
                    output_name: file.name.clone(),
                    size_bytes: file.data.len(),
                    download_url: file_url(batch.id, index),
                },
                ConversionResult::Failure {
                    input_name,
                    kind,
                    diagnostic,
                } => FileReport::Failure {
                    index,
                    input_name: input_name.clone(),
                    kind: *kind,
                    diagnostic: diagnostic.clone(),
                },
            })
            .collect();

        let archive = batch.has_successes().then(|| ArchiveLink {
            name: ARCHIVE_NAME.to_string(),
            download_url: archive_url(batch.id),
        });

        Self {
            batch_id: batch.id,
            format: batch.format,
            created_at,
            total: batch.len(),
            succeeded: batch.succeeded(),
            failed: batch.failed(),
            results,
            archive,
        }
    }

    pub fn from_stored(stored: &StoredBatch) -> Self {
        Self::new(&stored.batch, stored.created_at)
    }
}

fn file_url(batch_id: Uuid, index: usize) -> String {
    format!("{}/batches/{}/files/{}", API_PREFIX, batch_id, index)
}

fn archive_url(batch_id: Uuid) -> String {
    format!("{}/batches/{}/archive", API_PREFIX, batch_id)
}

// ============================================================================
// Form handling
// ============================================================================

/// Read every part of a convert form.
///
/// Repeated `files` parts are kept in upload order. Empty file parts without
/// a name (a file input left blank) are skipped. Unknown parts are ignored.
pub async fn read_form(mut multipart: Multipart) -> Result<ConvertForm, ApiError> {
    let mut form = ConvertForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(api_error(e.status(), e.body_text())),
        };

        let name = field.name().unwrap_or("").to_string();
        if name == "files" {
            let file_name = field.file_name().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| api_error(e.status(), format!("Failed to read file: {}", e)))?;

            // Reuses the buffer when uniquely owned.
            let file_name = match file_name.filter(|n| !n.is_empty()) {
                Some(file_name) => file_name,
                None if !data.is_empty() => UNNAMED_UPLOAD.to_string(),
                None => continue,
            };
            form.files.push(UploadedFile::new(file_name, Vec::from(data)));
            continue;
        }

        let text = field.text().await.map_err(|e| {
            api_error(
                e.status(),
                format!("Failed to read field '{}': {}", name, e),
            )
        })?;

        match name.as_str() {
            "format" => form.format = Some(text),
            "preset" => form.preset = Some(text),
            "batch_id" => form.progress_id = Some(text),
            "video_bitrate" => form.overrides.video_bitrate = text,
            "resolution" => form.overrides.resolution = text,
            "fps" => form.overrides.fps = text,
            "audio_bitrate" => form.overrides.audio_bitrate = text,
            "sample_rate" => form.overrides.sample_rate = text,
            "channels" => form.overrides.channels = text,
            _ => {}
        }
    }

    Ok(form)
}

/// Turn a form into a batch request, rejecting anything the converter
/// cannot act on.
pub fn build_request(state: &AppState, form: ConvertForm) -> Result<BatchRequest, ApiError> {
    if form.files.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No files uploaded"));
    }

    let format = match form.format.as_deref().map(str::trim) {
        Some(format) if !format.is_empty() => format
            .parse::<OutputFormat>()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?,
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "No output format selected",
            ))
        }
    };

    if !state
        .orchestrator()
        .converter()
        .supported_output_formats()
        .contains(&format)
    {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Output format not supported: {}", format),
        ));
    }

    let params = state
        .presets()
        .resolve(form.preset.as_deref(), &form.overrides)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    // Stored batches always get a fresh id; a client id only tags progress.
    let mut request = BatchRequest::new(form.files, format, params);

    if let Some(progress_id) = form.progress_id.as_deref().map(str::trim) {
        if !progress_id.is_empty() {
            let tag = Uuid::parse_str(progress_id).map_err(|e| {
                api_error(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid batch_id '{}': {}", progress_id, e),
                )
            })?;
            request = request.with_progress_id(tag);
        }
    }

    Ok(request)
}

/// Run a batch, relaying its progress to WebSocket clients, and keep the
/// result for download.
async fn run_batch(state: &Arc<AppState>, request: BatchRequest) -> Arc<StoredBatch> {
    let progress_id = request.progress_id;
    info!(
        batch_id = %request.id,
        progress_id = %progress_id,
        files = request.files.len(),
        format = %request.format,
        "Accepted conversion batch"
    );

    let (tx, mut rx) = mpsc::channel(PROGRESS_BUFFER);
    let broadcaster = state.ws_broadcaster().clone();
    let forwarder = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            broadcaster.batch_progress(progress);
        }
    });

    let batch = state.orchestrator().run(request, Some(tx)).await;

    if let Err(e) = forwarder.await {
        warn!(batch_id = %batch.id, "Progress forwarder failed: {}", e);
    }
    state
        .ws_broadcaster()
        .batch_completed(progress_id, batch.succeeded(), batch.failed());

    state.store().insert(batch).await
}

// ============================================================================
// Responses
// ============================================================================

/// `Content-Disposition: attachment` for `filename`, with an ASCII fallback
/// and the exact name percent-encoded in `filename*`.
pub fn content_disposition(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    );

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

fn attachment(filename: &str, content_type: &'static str, data: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, content_disposition(filename)),
        ],
        data,
    )
        .into_response()
}

fn archive_response(batch: &ConversionBatch) -> Result<Response, ApiError> {
    let bytes = pack_archive(batch.successes()).map_err(|e| {
        error!(batch_id = %batch.id, "Failed to pack archive: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to pack archive: {}", e),
        )
    })?;

    Ok(attachment(ARCHIVE_NAME, ARCHIVE_CONTENT_TYPE, bytes))
}

async fn stored_batch(state: &AppState, id: Uuid) -> Result<Arc<StoredBatch>, ApiError> {
    state.store().get(id).await.ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("Batch not found or expired: {}", id),
        )
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/convert
///
/// Convert the uploaded files and return the per-file report.
pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<BatchReport>, ApiError> {
    let form = read_form(multipart).await?;
    let request = build_request(&state, form)?;
    let stored = run_batch(&state, request).await;

    Ok(Json(BatchReport::from_stored(&stored)))
}

/// POST /api/v1/convert/archive
///
/// Convert the uploaded files and respond with the zip archive directly.
/// When every file failed, responds 422 with the report instead.
pub async fn convert_archive(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;
    let request = build_request(&state, form)?;
    let stored = run_batch(&state, request).await;

    if !stored.batch.has_successes() {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(BatchReport::from_stored(&stored)),
        )
            .into_response());
    }

    archive_response(&stored.batch)
}

/// GET /api/v1/batches/{id}
pub async fn get_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchReport>, ApiError> {
    let stored = stored_batch(&state, id).await?;
    Ok(Json(BatchReport::from_stored(&stored)))
}

/// GET /api/v1/batches/{id}/files/{index}
///
/// Download one converted file.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Response, ApiError> {
    let stored = stored_batch(&state, id).await?;

    match stored.batch.results.get(index) {
        Some(ConversionResult::Success(file)) => Ok(attachment(
            &file.name,
            "application/octet-stream",
            file.data.clone(),
        )),
        Some(ConversionResult::Failure { input_name, .. }) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("File {} ({}) failed to convert", index, input_name),
        )),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No file {} in batch {}", index, id),
        )),
    }
}

/// GET /api/v1/batches/{id}/archive
///
/// Download every converted file of a batch as one zip.
pub async fn download_archive(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let stored = stored_batch(&state, id).await?;

    if !stored.batch.has_successes() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Batch {} has no converted files", id),
        ));
    }

    archive_response(&stored.batch)
}

/// DELETE /api/v1/batches/{id}
pub async fn delete_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.store().remove(id).await {
        info!(batch_id = %id, "Discarded batch");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Batch not found or expired: {}", id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;
    use convertino_core::converter::ConvertedFile;

    async fn multipart(body: &str) -> Multipart {
        let request = Request::builder()
            .method("POST")
            .uri("/convert")
            .header("Content-Type", "multipart/form-data; boundary=XYZ")
            .body(Body::from(body.replace('\n', "\r\n")))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_read_form_collects_parts() {
        let body = "--XYZ\n\
            Content-Disposition: form-data; name=\"files\"; filename=\"a.wav\"\n\n\
            first\n\
            --XYZ\n\
            Content-Disposition: form-data; name=\"files\"; filename=\"\"\n\n\
            \n\
            --XYZ\n\
            Content-Disposition: form-data; name=\"files\"\n\n\
            unnamed\n\
            --XYZ\n\
            Content-Disposition: form-data; name=\"format\"\n\n\
            mp3\n\
            --XYZ\n\
            Content-Disposition: form-data; name=\"batch_id\"\n\n\
            3f2b8a9e-5c4d-4e1f-9a7b-0c6d2e8f1a3b\n\
            --XYZ--\n";

        let form = read_form(multipart(body).await).await.unwrap();

        assert_eq!(form.files.len(), 2);
        assert_eq!(form.files[0].name, "a.wav");
        assert_eq!(form.files[0].data, b"first");
        assert_eq!(form.files[1].name, "upload");
        assert_eq!(form.files[1].data, b"unnamed");
        assert_eq!(form.format.as_deref(), Some("mp3"));
        assert_eq!(
            form.progress_id.as_deref(),
            Some("3f2b8a9e-5c4d-4e1f-9a7b-0c6d2e8f1a3b")
        );
    }

    #[test]
    fn test_content_disposition_ascii() {
        let value = content_disposition("song_converted.mp3");
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename=\"song_converted.mp3\"; filename*=UTF-8''song_converted.mp3"
        );
    }

    #[test]
    fn test_content_disposition_non_ascii() {
        let value = content_disposition("café \"live\".mp3");
        let value = value.to_str().unwrap();
        assert!(value.starts_with("attachment; filename=\"caf_ _live_.mp3\""));
        assert!(value.contains("filename*=UTF-8''caf%C3%A9%20%22live%22.mp3"));
    }

    #[test]
    fn test_report_shape() {
        let id = Uuid::new_v4();
        let batch = ConversionBatch {
            id,
            format: OutputFormat::Mp3,
            results: vec![
                ConversionResult::Success(ConvertedFile {
                    name: "a_converted.mp3".to_string(),
                    data: vec![0; 10],
                }),
                ConversionResult::Failure {
                    input_name: "b.wav".to_string(),
                    kind: FailureKind::ConversionFailed,
                    diagnostic: "b.wav: Invalid data found".to_string(),
                },
            ],
        };

        let report = BatchReport::new(&batch, Utc::now());
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["batch_id"], id.to_string());
        assert_eq!(json["format"], "mp3");
        assert_eq!(json["total"], 2);
        assert_eq!(json["succeeded"], 1);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["results"][0]["status"], "success");
        assert_eq!(json["results"][0]["size_bytes"], 10);
        assert_eq!(
            json["results"][0]["download_url"],
            format!("/api/v1/batches/{}/files/0", id)
        );
        assert_eq!(json["results"][1]["status"], "failure");
        assert_eq!(json["results"][1]["kind"], "conversion_failed");
        assert_eq!(json["results"][1]["diagnostic"], "b.wav: Invalid data found");
        assert_eq!(json["archive"]["name"], "converted_files.zip");
        assert_eq!(
            json["archive"]["download_url"],
            format!("/api/v1/batches/{}/archive", id)
        );
    }

    #[test]
    fn test_report_without_successes_has_no_archive() {
        let batch = ConversionBatch {
            id: Uuid::new_v4(),
            format: OutputFormat::Wav,
            results: vec![ConversionResult::Failure {
                input_name: "x.mp3".to_string(),
                kind: FailureKind::ToolUnavailable,
                diagnostic: "FFmpeg unavailable".to_string(),
            }],
        };

        let json = serde_json::to_value(BatchReport::new(&batch, Utc::now())).unwrap();
        assert!(json.get("archive").is_none());
        assert_eq!(json["results"][0]["kind"], "tool_unavailable");
    }
}
