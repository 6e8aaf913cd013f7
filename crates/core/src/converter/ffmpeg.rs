//! FFmpeg-based converter implementation.

use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use super::command::{build_ffmpeg_args, format_args_for_display};
use super::config::ConverterConfig;
use super::error::ConverterError;
use super::scratch::Scratch;
use super::traits::Converter;
use super::types::{ConversionParams, ConvertedFile, OutputFormat, UploadedFile};

/// FFmpeg-based converter implementation.
///
/// Stateless apart from its configuration: every call stages its own scratch
/// files, so one instance can serve concurrent conversions.
pub struct FfmpegConverter {
    config: ConverterConfig,
}

impl FfmpegConverter {
    /// Creates a new FFmpeg converter with the given configuration.
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Creates a converter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    /// Returns the converter configuration.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Classifies a spawn error.
    ///
    /// A missing or non-executable binary means the tool is unavailable,
    /// anything else is plain I/O.
    fn launch_error(&self, e: std::io::Error) -> ConverterError {
        match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ConverterError::ToolUnavailable {
                    path: self.config.ffmpeg_path.clone(),
                    reason: e.to_string(),
                }
            }
            _ => ConverterError::Io(e),
        }
    }

    /// Runs ffmpeg to completion, capturing stdout and stderr separately.
    async fn run_ffmpeg(&self, args: &[String]) -> Result<Output, ConverterError> {
        debug!(
            command = %format_args_for_display(&self.config.ffmpeg_path, args),
            "Running ffmpeg"
        );

        let child = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.launch_error(e))?;

        let output = match self.config.timeout_secs {
            // Dropping the child on timeout kills it.
            Some(secs) => timeout(Duration::from_secs(secs), child.wait_with_output())
                .await
                .map_err(|_| ConverterError::Timeout { timeout_secs: secs })??,
            None => child.wait_with_output().await?,
        };

        Ok(output)
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn convert(
        &self,
        file: &UploadedFile,
        format: OutputFormat,
        params: &ConversionParams,
    ) -> Result<ConvertedFile, ConverterError> {
        let start = Instant::now();
        let output_name = file.output_name(format);

        // Dropped on every return path below, removing input and output.
        let scratch = Scratch::stage(&self.config.temp_dir, file, &output_name).await?;

        let args = build_ffmpeg_args(scratch.input_path(), scratch.output_path(), params);
        let output = self.run_ffmpeg(&args).await?;
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let reason = match output.status.code() {
                Some(code) => format!("FFmpeg exited with code {}", code),
                None => "FFmpeg terminated by signal".to_string(),
            };
            return Err(ConverterError::conversion_failed(reason, stderr));
        }

        let data = match tokio::fs::read(scratch.output_path()).await {
            Ok(data) if !data.is_empty() => data,
            Ok(_) => {
                return Err(ConverterError::conversion_failed(
                    "Output file is empty",
                    stderr,
                ))
            }
            Err(_) => {
                return Err(ConverterError::conversion_failed(
                    "Output file not created",
                    stderr,
                ))
            }
        };

        info!(
            input = %file.name,
            output = %output_name,
            input_bytes = file.data.len(),
            output_bytes = data.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Converted file"
        );

        Ok(ConvertedFile {
            name: output_name,
            data,
        })
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.launch_error(e))?;

        if !output.status.success() {
            return Err(ConverterError::ToolUnavailable {
                path: self.config.ffmpeg_path.clone(),
                reason: format!("`-version` exited with {}", output.status),
            });
        }

        // Ensure temp dir exists
        tokio::fs::create_dir_all(&self.config.temp_dir).await?;

        Ok(())
    }
}
