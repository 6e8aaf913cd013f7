//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while converting a single file.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// FFmpeg could not be launched at all.
    #[error("FFmpeg unavailable at {path}: {reason}")]
    ToolUnavailable { path: PathBuf, reason: String },

    /// FFmpeg ran but exited non-zero or produced no output.
    #[error("Conversion failed: {reason}")]
    ConversionFailed { reason: String, stderr: String },

    /// Conversion timed out.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while staging input or reading output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConverterError {
    /// Creates a new conversion failed error with stderr output.
    pub fn conversion_failed(reason: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            stderr: stderr.into(),
        }
    }

    /// Diagnostic text shown to the user for this error.
    ///
    /// For tool failures this is ffmpeg's stderr verbatim.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::ConversionFailed { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors raised while turning user input into conversion parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Invalid channel choice: {0}")]
    InvalidChannels(String),
}
