//! Trait definitions for the converter module.

use async_trait::async_trait;

use super::error::ConverterError;
use super::types::{ConversionParams, ConvertedFile, OutputFormat, UploadedFile};

/// A converter that can transcode one uploaded file.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Converts one file to `format` using `params`.
    ///
    /// Implementations own all intermediate files and must leave nothing
    /// behind, whatever the outcome.
    async fn convert(
        &self,
        file: &UploadedFile,
        format: OutputFormat,
        params: &ConversionParams,
    ) -> Result<ConvertedFile, ConverterError>;

    /// Validates that the converter is properly configured and ready.
    async fn validate(&self) -> Result<(), ConverterError>;

    /// Returns the supported output formats.
    fn supported_output_formats(&self) -> &[OutputFormat] {
        &OutputFormat::ALL
    }
}
