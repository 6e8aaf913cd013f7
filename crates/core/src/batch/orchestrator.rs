//! Batch orchestrator implementation.
//!
//! Runs every uploaded file of a batch through the converter with a bounded
//! number in flight, collecting results and progress in upload order.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::converter::{ConversionParams, Converter, OutputFormat, UploadedFile};
use crate::metrics;

use super::types::{BatchProgress, BatchRequest, ConversionBatch, ConversionResult, FailureKind};

/// Drives one batch of uploads through a converter.
pub struct BatchOrchestrator {
    converter: Arc<dyn Converter>,
    max_parallel: usize,
}

impl BatchOrchestrator {
    /// Create a new orchestrator. A `max_parallel` of 0 is treated as 1.
    pub fn new(converter: Arc<dyn Converter>, max_parallel: usize) -> Self {
        Self {
            converter,
            max_parallel: max_parallel.max(1),
        }
    }

    /// The converter used for each file.
    pub fn converter(&self) -> &Arc<dyn Converter> {
        &self.converter
    }

    /// Maximum conversions in flight within one batch.
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Converts every file in `request`.
    ///
    /// Every file is attempted; a failed file never stops the batch. When a
    /// progress sender is given, one event is sent after each file in upload
    /// order. A dropped receiver is ignored.
    pub async fn run(
        &self,
        request: BatchRequest,
        progress: Option<mpsc::Sender<BatchProgress>>,
    ) -> ConversionBatch {
        let BatchRequest {
            id,
            progress_id,
            files,
            format,
            params,
        } = request;
        let total = files.len();
        let start = Instant::now();

        info!(
            batch_id = %id,
            files = total,
            format = %format,
            max_parallel = self.max_parallel,
            "Starting batch"
        );
        metrics::BATCHES_TOTAL.inc();
        metrics::BATCH_FILES.observe(total as f64);

        // Each conversion owns what it uses, so the batch future stays `Send`.
        let converter = Arc::clone(&self.converter);
        let params = Arc::new(params);

        // `buffered` yields in input order even when later files finish first.
        let mut outcomes = stream::iter(files)
            .map(move |file| {
                convert_one(Arc::clone(&converter), file, format, Arc::clone(&params))
            })
            .buffered(self.max_parallel);

        let mut results = Vec::with_capacity(total);
        let mut progress = progress;
        while let Some(result) = outcomes.next().await {
            let event = BatchProgress::new(progress_id, results.len() + 1, total, &result);
            debug!(
                batch_id = %id,
                completed = event.completed,
                total,
                percent = event.percent,
                "Batch progress"
            );

            if let Some(tx) = &progress {
                if tx.send(event).await.is_err() {
                    debug!(batch_id = %id, "Progress receiver dropped");
                    progress = None;
                }
            }

            results.push(result);
        }

        let batch = ConversionBatch {
            id,
            format,
            results,
        };

        info!(
            batch_id = %id,
            succeeded = batch.succeeded(),
            failed = batch.failed(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch finished"
        );

        batch
    }
}

async fn convert_one(
    converter: Arc<dyn Converter>,
    file: UploadedFile,
    format: OutputFormat,
    params: Arc<ConversionParams>,
) -> ConversionResult {
    let start = Instant::now();
    let outcome = converter.convert(&file, format, &params).await;
    let elapsed = start.elapsed();

    if let Err(e) = &outcome {
        match FailureKind::from(e) {
            FailureKind::ToolUnavailable => {
                error!(file = %file.name, error = %e, "FFmpeg unavailable")
            }
            FailureKind::ConversionFailed => {
                warn!(file = %file.name, error = %e, "Conversion failed")
            }
        }
    }

    let result = ConversionResult::from_outcome(&file, outcome);

    let label = result.result_label();
    metrics::CONVERSIONS_TOTAL.with_label_values(&[label]).inc();
    metrics::CONVERSION_DURATION
        .with_label_values(&[label])
        .observe(elapsed.as_secs_f64());

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ConverterError;
    use crate::testing::MockConverter;
    use std::time::Duration;

    fn three_files() -> Vec<UploadedFile> {
        vec![
            UploadedFile::new("first.mov", b"one".to_vec()),
            UploadedFile::new("second.mov", b"two".to_vec()),
            UploadedFile::new("third.mov", b"three".to_vec()),
        ]
    }

    fn three_file_request(format: OutputFormat) -> BatchRequest {
        BatchRequest::new(three_files(), format, ConversionParams::default())
    }

    async fn run_middle_failing(max_parallel: usize) {
        let converter = Arc::new(MockConverter::new());
        converter
            .fail_on("second.mov", "Invalid data found when processing input")
            .await;
        let orchestrator = BatchOrchestrator::new(converter.clone(), max_parallel);

        let (tx, mut rx) = mpsc::channel(16);
        let request = three_file_request(OutputFormat::Mp4);
        let id = request.id;
        let batch = orchestrator.run(request, Some(tx)).await;

        assert_eq!(batch.id, id);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.results[0].name(), "first_converted.mp4");
        assert!(batch.results[0].is_success());
        assert_eq!(
            batch.results[1],
            ConversionResult::Failure {
                input_name: "second.mov".to_string(),
                kind: FailureKind::ConversionFailed,
                diagnostic: "Invalid data found when processing input".to_string(),
            }
        );
        assert_eq!(batch.results[2].name(), "third_converted.mp4");
        assert_eq!(batch.succeeded(), 2);
        assert_eq!(batch.failed(), 1);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![33, 66, 100]);
        assert_eq!(events[1].file_name, "second.mov");
        assert!(!events[1].succeeded);
        assert!(events.iter().all(|e| e.batch_id == id && e.total == 3));

        assert_eq!(converter.conversion_count().await, 3);
    }

    #[tokio::test]
    async fn test_middle_failure_sequential() {
        run_middle_failing(1).await;
    }

    #[tokio::test]
    async fn test_middle_failure_parallel() {
        run_middle_failing(3).await;
    }

    #[tokio::test]
    async fn test_sequential_never_overlaps() {
        let converter = Arc::new(MockConverter::new());
        converter.set_conversion_duration(Duration::from_millis(10)).await;
        let orchestrator = BatchOrchestrator::new(converter.clone(), 1);

        let request = three_file_request(OutputFormat::Mp3);
        orchestrator.run(request, None).await;

        assert_eq!(converter.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_parallel_keeps_upload_order() {
        let converter = Arc::new(MockConverter::new());
        converter
            .set_duration_for("first.mov", Duration::from_millis(80))
            .await;
        let orchestrator = BatchOrchestrator::new(converter.clone(), 3);

        let (tx, mut rx) = mpsc::channel(16);
        let request = three_file_request(OutputFormat::Mkv);
        let batch = orchestrator.run(request, Some(tx)).await;

        let names: Vec<_> = batch.results.iter().map(|r| r.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["first_converted.mkv", "second_converted.mkv", "third_converted.mkv"]
        );

        let mut completed = Vec::new();
        while let Some(event) = rx.recv().await {
            completed.push(event.completed);
        }
        assert_eq!(completed, vec![1, 2, 3]);
        assert!(converter.max_in_flight() > 1);
        assert!(converter.max_in_flight() <= 3);
    }

    #[tokio::test]
    async fn test_tool_unavailable_is_contained_per_file() {
        let converter = Arc::new(MockConverter::new());
        converter.set_tool_unavailable(true).await;
        let orchestrator = BatchOrchestrator::new(converter.clone(), 1);

        let request = three_file_request(OutputFormat::Wav);
        let batch = orchestrator.run(request, None).await;

        assert_eq!(batch.len(), 3);
        assert!(!batch.has_successes());
        assert!(batch.results.iter().all(|r| matches!(
            r,
            ConversionResult::Failure {
                kind: FailureKind::ToolUnavailable,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_params_reach_converter() {
        let converter = Arc::new(MockConverter::new());
        let orchestrator = BatchOrchestrator::new(converter.clone(), 2);
        let params = ConversionParams {
            audio_bitrate: Some("96k".to_string()),
            ..Default::default()
        };

        let request = BatchRequest::new(three_files(), OutputFormat::Aac, params.clone());
        orchestrator.run(request, None).await;

        for recorded in converter.recorded_conversions().await {
            assert_eq!(recorded.params, params);
            assert_eq!(recorded.format, OutputFormat::Aac);
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let orchestrator = BatchOrchestrator::new(Arc::new(MockConverter::new()), 1);
        let (tx, mut rx) = mpsc::channel(4);

        let request =
            BatchRequest::new(Vec::new(), OutputFormat::Mp4, ConversionParams::default());
        let batch = orchestrator.run(request, Some(tx)).await;

        assert!(batch.is_empty());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_progress_receiver_does_not_stop_batch() {
        let orchestrator = BatchOrchestrator::new(Arc::new(MockConverter::new()), 1);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let request = three_file_request(OutputFormat::Mp4);
        let batch = orchestrator.run(request, Some(tx)).await;
        assert_eq!(batch.succeeded(), 3);
    }

    #[tokio::test]
    async fn test_injected_error_only_affects_one_file() {
        let converter = Arc::new(MockConverter::new());
        converter
            .set_next_error(ConverterError::Timeout { timeout_secs: 30 })
            .await;
        let orchestrator = BatchOrchestrator::new(converter, 1);

        let request = three_file_request(OutputFormat::Mp4);
        let batch = orchestrator.run(request, None).await;

        assert!(!batch.results[0].is_success());
        assert!(batch.results[1].is_success());
        assert!(batch.results[2].is_success());
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_run_future_is_send() {
        let orchestrator = Arc::new(BatchOrchestrator::new(Arc::new(MockConverter::new()), 2));

        let run = orchestrator.run(three_file_request(OutputFormat::Mp3), None);
        assert_send(&run);
        drop(run);

        let spawned = Arc::clone(&orchestrator);
        let batch = tokio::spawn(async move {
            spawned
                .run(three_file_request(OutputFormat::Mp3), None)
                .await
        })
        .await
        .unwrap();
        assert_eq!(batch.succeeded(), 3);
    }

    #[tokio::test]
    async fn test_progress_carries_progress_id() {
        let orchestrator = BatchOrchestrator::new(Arc::new(MockConverter::new()), 1);
        let (tx, mut rx) = mpsc::channel(16);
        let tag = uuid::Uuid::new_v4();

        let request = three_file_request(OutputFormat::Mp4).with_progress_id(tag);
        let id = request.id;
        let batch = orchestrator.run(request, Some(tx)).await;

        assert_eq!(batch.id, id);
        while let Some(event) = rx.recv().await {
            assert_eq!(event.batch_id, tag);
        }
    }

    #[tokio::test]
    async fn test_batch_size_is_observed() {
        let orchestrator = BatchOrchestrator::new(Arc::new(MockConverter::new()), 1);
        let before = metrics::BATCH_FILES.get_sample_count();
        let sum_before = metrics::BATCH_FILES.get_sample_sum();

        orchestrator
            .run(three_file_request(OutputFormat::Mp3), None)
            .await;

        assert!(metrics::BATCH_FILES.get_sample_count() > before);
        assert!(metrics::BATCH_FILES.get_sample_sum() >= sum_before + 3.0);
    }

    #[test]
    fn test_zero_parallel_is_clamped() {
        let orchestrator = BatchOrchestrator::new(Arc::new(MockConverter::new()), 0);
        assert_eq!(orchestrator.max_parallel(), 1);
    }
}
