pub mod archive;
pub mod batch;
pub mod config;
pub mod converter;
pub mod metrics;
pub mod testing;

pub use archive::{pack_archive, ArchiveError, ARCHIVE_CONTENT_TYPE, ARCHIVE_NAME};
pub use batch::{
    BatchOrchestrator, BatchProgress, BatchRequest, ConversionBatch, ConversionResult, FailureKind,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, RetentionConfig,
    ServerConfig,
};
pub use converter::{
    Converter, ConverterConfig, ConverterError, FfmpegConverter, OutputFormat, ParamError,
    PresetCatalog, UploadedFile,
};
