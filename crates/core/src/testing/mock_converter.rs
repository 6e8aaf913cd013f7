//! Mock converter for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::converter::{
    ConversionParams, ConvertedFile, Converter, ConverterError, OutputFormat, UploadedFile,
};

/// A recorded conversion for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedConversion {
    /// Name of the uploaded file.
    pub input_name: String,
    pub format: OutputFormat,
    pub params: ConversionParams,
    /// Whether the conversion succeeded.
    pub success: bool,
}

/// Mock implementation of the Converter trait.
///
/// Provides controllable behavior for testing:
/// - Track conversions for assertions
/// - Fail specific files by name, or every file as if ffmpeg were missing
/// - Simulate conversion time, globally or per file
/// - Observe how many conversions ran at once
///
/// Successful conversions echo the input bytes under the usual
/// `<base>_converted.<format>` name.
///
/// # Example
///
/// ```rust,ignore
/// use convertino_core::testing::MockConverter;
///
/// let converter = MockConverter::new();
/// converter.fail_on("broken.mov", "moov atom not found").await;
///
/// let result = converter.convert(&file, OutputFormat::Mp4, &params).await;
///
/// let conversions = converter.recorded_conversions().await;
/// assert_eq!(conversions.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockConverter {
    /// Recorded conversions.
    conversions: Arc<RwLock<Vec<RecordedConversion>>>,
    /// Files that fail with the given stderr, by upload name.
    failures: Arc<RwLock<HashMap<String, String>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<ConverterError>>>,
    /// When true, every call fails as if ffmpeg were missing.
    tool_unavailable: Arc<RwLock<bool>>,
    /// Simulated conversion duration.
    delay: Arc<RwLock<Duration>>,
    /// Per-file simulated duration, overriding `delay`.
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockConverter {
    /// Create a new mock converter that succeeds instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded conversions, in the order they started.
    pub async fn recorded_conversions(&self) -> Vec<RecordedConversion> {
        self.conversions.read().await.clone()
    }

    /// Get the number of conversions performed.
    pub async fn conversion_count(&self) -> usize {
        self.conversions.read().await.len()
    }

    /// Make the file uploaded as `name` fail with `stderr`.
    pub async fn fail_on(&self, name: impl Into<String>, stderr: impl Into<String>) {
        self.failures.write().await.insert(name.into(), stderr.into());
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: ConverterError) {
        *self.next_error.write().await = Some(error);
    }

    /// Simulate a missing ffmpeg binary for every call.
    pub async fn set_tool_unavailable(&self, unavailable: bool) {
        *self.tool_unavailable.write().await = unavailable;
    }

    /// Set the simulated conversion duration.
    pub async fn set_conversion_duration(&self, duration: Duration) {
        *self.delay.write().await = duration;
    }

    /// Set the simulated conversion duration for one file.
    pub async fn set_duration_for(&self, name: impl Into<String>, duration: Duration) {
        self.delays.write().await.insert(name.into(), duration);
    }

    /// Highest number of conversions observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<ConverterError> {
        self.next_error.write().await.take()
    }

    async fn outcome(&self, file: &UploadedFile) -> Option<ConverterError> {
        if let Some(err) = self.take_error().await {
            return Some(err);
        }

        if *self.tool_unavailable.read().await {
            return Some(ConverterError::ToolUnavailable {
                path: PathBuf::from("ffmpeg"),
                reason: "No such file or directory (os error 2)".to_string(),
            });
        }

        self.failures
            .read()
            .await
            .get(&file.name)
            .map(|stderr| {
                ConverterError::conversion_failed("FFmpeg exited with code 1", stderr.clone())
            })
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn convert(
        &self,
        file: &UploadedFile,
        format: OutputFormat,
        params: &ConversionParams,
    ) -> Result<ConvertedFile, ConverterError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let error = self.outcome(file).await;

        // Record the conversion
        self.conversions.write().await.push(RecordedConversion {
            input_name: file.name.clone(),
            format,
            params: params.clone(),
            success: error.is_none(),
        });

        // Simulate conversion time
        let delay = match self.delays.read().await.get(&file.name) {
            Some(delay) => *delay,
            None => *self.delay.read().await,
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match error {
            Some(err) => Err(err),
            None => Ok(ConvertedFile {
                name: file.output_name(format),
                data: file.data.clone(),
            }),
        }
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        if *self.tool_unavailable.read().await {
            return Err(ConverterError::ToolUnavailable {
                path: PathBuf::from("ffmpeg"),
                reason: "No such file or directory (os error 2)".to_string(),
            });
        }
        Ok(())
    }
}
