//! Batch conversion of uploaded files.
//!
//! A batch is one convert action: every uploaded file is converted with the
//! same format and parameters. Files are attempted in upload order with a
//! bounded pool; a failure is recorded for that file and the batch moves on.

mod orchestrator;
mod types;

pub use orchestrator::BatchOrchestrator;
pub use types::{
    progress_percent, BatchProgress, BatchRequest, ConversionBatch, ConversionResult, FailureKind,
};
