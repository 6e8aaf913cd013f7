//! Converter module for transcoding uploaded media files.
//!
//! This module provides the `Converter` trait and an FFmpeg-backed
//! implementation that converts one in-memory upload at a time.
//!
//! # Flow
//!
//! - Resolve a preset plus manual overrides into `ConversionParams`
//! - Stage the upload into a private scratch file (`Scratch`)
//! - Run ffmpeg with arguments from `build_ffmpeg_args`
//! - Read the output back into memory; scratch files are removed on drop
//!
//! # Example
//!
//! ```ignore
//! use convertino_core::converter::{
//!     Converter, FfmpegConverter, OutputFormat, ParamOverrides, PresetCatalog, UploadedFile,
//! };
//!
//! let converter = FfmpegConverter::with_defaults();
//! converter.validate().await?;
//!
//! let params = PresetCatalog::builtin().resolve(
//!     Some("Mobile Friendly"),
//!     &ParamOverrides::default(),
//! )?;
//!
//! let file = UploadedFile::new("holiday.mov", std::fs::read("holiday.mov")?);
//! let converted = converter.convert(&file, OutputFormat::Mp4, &params).await?;
//! assert_eq!(converted.name, "holiday_converted.mp4");
//! ```

mod command;
mod config;
mod error;
mod ffmpeg;
mod presets;
mod scratch;
mod traits;
mod types;

pub use command::{build_ffmpeg_args, format_args_for_display};
pub use config::ConverterConfig;
pub use error::{ConverterError, ParamError};
pub use ffmpeg::FfmpegConverter;
pub use presets::{Preset, PresetCatalog, PresetConfig, DEFAULT_PRESET};
pub use scratch::Scratch;
pub use traits::Converter;
pub use types::{
    ChannelLayout, ConversionParams, ConvertedFile, OutputFormat, ParamOverrides, UploadedFile,
};
