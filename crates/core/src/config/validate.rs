use std::collections::HashSet;

use super::{types::Config, ConfigError};
use crate::converter::PresetCatalog;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - At least one conversion may run at a time
/// - The batch store can hold at least one batch
/// - Configured presets have unique, non-empty names and valid channels
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Converter validation
    if config.converter.max_parallel_conversions == 0 {
        return Err(ConfigError::ValidationError(
            "converter.max_parallel_conversions must be at least 1".to_string(),
        ));
    }

    if config.converter.timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "converter.timeout_secs must be at least 1 when set".to_string(),
        ));
    }

    // Retention validation
    if config.retention.max_batches == 0 {
        return Err(ConfigError::ValidationError(
            "retention.max_batches must be at least 1".to_string(),
        ));
    }

    // Preset validation
    let mut names = HashSet::new();
    for preset in &config.presets {
        let name = preset.name.trim();
        if name.is_empty() {
            return Err(ConfigError::ValidationError(
                "presets: name cannot be empty".to_string(),
            ));
        }
        if !names.insert(name) {
            return Err(ConfigError::ValidationError(format!(
                "presets: duplicate preset name '{}'",
                name
            )));
        }
    }

    PresetCatalog::with_configured(&config.presets)
        .map_err(|e| ConfigError::ValidationError(format!("presets: {}", e)))?;

    Ok(())
}
