//! Types for the batch orchestrator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::converter::{
    ConversionParams, ConvertedFile, ConverterError, OutputFormat, UploadedFile,
};

/// Everything one convert action needs, passed explicitly to the orchestrator.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Batch identifier. Always generated here, never chosen by a client.
    pub id: Uuid,
    /// Tag carried by progress events so a listener can pick out this batch.
    /// Defaults to `id`.
    pub progress_id: Uuid,
    /// Uploaded files in upload order.
    pub files: Vec<UploadedFile>,
    /// Target output format.
    pub format: OutputFormat,
    /// Resolved parameters applied to every file.
    pub params: ConversionParams,
}

impl BatchRequest {
    /// Creates a request with a fresh random id.
    pub fn new(files: Vec<UploadedFile>, format: OutputFormat, params: ConversionParams) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            progress_id: id,
            files,
            format,
            params,
        }
    }

    /// Tags progress events with a caller-chosen id. The batch id is unaffected.
    pub fn with_progress_id(mut self, progress_id: Uuid) -> Self {
        self.progress_id = progress_id;
        self
    }
}

/// Why a single file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// FFmpeg ran but did not produce a usable output.
    ConversionFailed,
    /// FFmpeg could not be launched.
    ToolUnavailable,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConversionFailed => "conversion_failed",
            Self::ToolUnavailable => "tool_unavailable",
        }
    }
}

impl From<&ConverterError> for FailureKind {
    fn from(err: &ConverterError) -> Self {
        match err {
            ConverterError::ToolUnavailable { .. } => Self::ToolUnavailable,
            _ => Self::ConversionFailed,
        }
    }
}

/// Outcome of converting one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionResult {
    /// The converted output.
    Success(ConvertedFile),
    /// The file could not be converted.
    Failure {
        /// Original upload name.
        input_name: String,
        kind: FailureKind,
        /// Diagnostic text for the user (ffmpeg's stderr for tool failures).
        diagnostic: String,
    },
}

impl ConversionResult {
    /// Folds a converter outcome into a result for `file`.
    pub fn from_outcome(
        file: &UploadedFile,
        outcome: Result<ConvertedFile, ConverterError>,
    ) -> Self {
        match outcome {
            Ok(converted) => Self::Success(converted),
            Err(e) => Self::Failure {
                input_name: file.name.clone(),
                kind: FailureKind::from(&e),
                diagnostic: e.diagnostic(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Output name for successes, input name for failures.
    pub fn name(&self) -> &str {
        match self {
            Self::Success(file) => &file.name,
            Self::Failure { input_name, .. } => input_name,
        }
    }

    /// The converted file, if this is a success.
    pub fn converted(&self) -> Option<&ConvertedFile> {
        match self {
            Self::Success(file) => Some(file),
            Self::Failure { .. } => None,
        }
    }

    /// Label used for metrics.
    pub fn result_label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Failure { kind, .. } => kind.as_str(),
        }
    }
}

/// Ordered results of one convert action.
#[derive(Debug, Clone)]
pub struct ConversionBatch {
    pub id: Uuid,
    pub format: OutputFormat,
    /// One result per uploaded file, in upload order.
    pub results: Vec<ConversionResult>,
}

impl ConversionBatch {
    /// Converted files in upload order.
    pub fn successes(&self) -> impl Iterator<Item = &ConvertedFile> {
        self.results.iter().filter_map(ConversionResult::converted)
    }

    pub fn succeeded(&self) -> usize {
        self.successes().count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn has_successes(&self) -> bool {
        self.results.iter().any(ConversionResult::is_success)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Emitted after each file finishes, in upload order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// The request's progress id.
    pub batch_id: Uuid,
    /// Files finished so far, including this one.
    pub completed: usize,
    pub total: usize,
    /// `completed * 100 / total`, truncated.
    pub percent: u8,
    /// Name of the file that just finished.
    pub file_name: String,
    pub succeeded: bool,
}

impl BatchProgress {
    pub fn new(
        batch_id: Uuid,
        completed: usize,
        total: usize,
        result: &ConversionResult,
    ) -> Self {
        Self {
            batch_id,
            completed,
            total,
            percent: progress_percent(completed, total),
            file_name: result.name().to_string(),
            succeeded: result.is_success(),
        }
    }
}

/// Integer percentage of `completed` out of `total`, truncated and capped at 100.
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (completed.min(total) * 100 / total) as u8
}
