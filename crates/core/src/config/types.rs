use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::converter::{ConverterConfig, PresetConfig};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Extra presets, appended to (or replacing) the built-in ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presets: Vec<PresetConfig>,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted request body, covering all uploads of one batch.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Directory served for paths outside the API (front-end assets).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            static_dir: None,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    1024 * 1024 * 1024 // 1 GiB
}

/// How long finished batches stay downloadable.
///
/// Results are held in memory only; a batch is dropped when its TTL lapses
/// or when newer batches push it past `max_batches`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_batches")]
    pub max_batches: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_batches: default_max_batches(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    900
}

fn default_max_batches() -> usize {
    32
}
