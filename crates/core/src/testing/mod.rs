//! Testing utilities and mock implementations.
//!
//! `MockConverter` stands in for ffmpeg in orchestrator and API tests;
//! `FakeFfmpeg` writes small shell scripts that exercise the real subprocess
//! path of `FfmpegConverter`.
//!
//! # Example
//!
//! ```rust,ignore
//! use convertino_core::testing::MockConverter;
//!
//! let converter = Arc::new(MockConverter::new());
//! converter.fail_on("broken.mov", "moov atom not found").await;
//!
//! let orchestrator = BatchOrchestrator::new(converter.clone(), 1);
//! ```

mod fake_ffmpeg;
mod mock_converter;

pub use fake_ffmpeg::{spawn_guard, FakeFfmpeg};
pub use mock_converter::{MockConverter, RecordedConversion};
