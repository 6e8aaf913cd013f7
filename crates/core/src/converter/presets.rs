//! Named parameter presets and the override merge.

use serde::{Deserialize, Serialize};

use super::error::ParamError;
use super::types::{ChannelLayout, ConversionParams, ParamOverrides};

/// Name of the preset that changes nothing.
pub const DEFAULT_PRESET: &str = "Default (No Changes)";

/// A named bundle of default parameter values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub name: String,
    #[serde(flatten)]
    pub params: ConversionParams,
}

impl Preset {
    fn builtin(
        name: &str,
        video_bitrate: &str,
        resolution: &str,
        fps: &str,
        audio_bitrate: &str,
        sample_rate: &str,
        channels: ChannelLayout,
    ) -> Self {
        Self {
            name: name.to_string(),
            params: ConversionParams {
                video_bitrate: Some(video_bitrate.to_string()),
                resolution: Some(resolution.to_string()),
                fps: Some(fps.to_string()),
                audio_bitrate: Some(audio_bitrate.to_string()),
                sample_rate: Some(sample_rate.to_string()),
                channels: Some(channels),
            },
        }
    }
}

/// Preset as declared in the configuration file.
///
/// Field values are taken verbatim; `channels` accepts the same choices as
/// the channel selector ("1", "2 (Stereo)", "mono", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_bitrate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<String>,
}

impl TryFrom<&PresetConfig> for Preset {
    type Error = ParamError;

    fn try_from(config: &PresetConfig) -> Result<Self, Self::Error> {
        let channels = match config.channels.as_deref() {
            Some(choice) if !choice.trim().is_empty() => ChannelLayout::parse_choice(choice)?,
            _ => None,
        };

        Ok(Self {
            name: config.name.trim().to_string(),
            params: ConversionParams {
                video_bitrate: non_empty(config.video_bitrate.as_deref()),
                resolution: non_empty(config.resolution.as_deref()),
                fps: non_empty(config.fps.as_deref()),
                audio_bitrate: non_empty(config.audio_bitrate.as_deref()),
                sample_rate: non_empty(config.sample_rate.as_deref()),
                channels,
            },
        })
    }
}

/// Read-only, ordered preset catalog built at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetCatalog {
    presets: Vec<Preset>,
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PresetCatalog {
    /// The built-in presets.
    pub fn builtin() -> Self {
        Self {
            presets: vec![
                Preset {
                    name: DEFAULT_PRESET.to_string(),
                    params: ConversionParams::default(),
                },
                Preset::builtin(
                    "Mobile Friendly",
                    "800k",
                    "854x480",
                    "24",
                    "128k",
                    "44100",
                    ChannelLayout::Stereo,
                ),
                Preset::builtin(
                    "High Quality",
                    "2500k",
                    "1920x1080",
                    "30",
                    "320k",
                    "48000",
                    ChannelLayout::Stereo,
                ),
                Preset::builtin(
                    "Low Size (Compressed)",
                    "500k",
                    "640x360",
                    "20",
                    "96k",
                    "22050",
                    ChannelLayout::Mono,
                ),
            ],
        }
    }

    /// Built-in presets extended with configured ones.
    ///
    /// A configured preset replaces a built-in of the same name in place;
    /// new names are appended in declaration order.
    pub fn with_configured(configured: &[PresetConfig]) -> Result<Self, ParamError> {
        let mut catalog = Self::builtin();
        for entry in configured {
            let preset = Preset::try_from(entry)?;
            match catalog.presets.iter_mut().find(|p| p.name == preset.name) {
                Some(existing) => *existing = preset,
                None => catalog.presets.push(preset),
            }
        }
        Ok(catalog)
    }

    /// All presets in presentation order.
    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    /// Looks up a preset by exact name.
    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Merges user overrides over a preset.
    ///
    /// Each field is the override when non-empty, else the preset's value,
    /// else unset. Free-text values are not validated.
    pub fn resolve(
        &self,
        preset_name: Option<&str>,
        overrides: &ParamOverrides,
    ) -> Result<ConversionParams, ParamError> {
        let base = match preset_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => self
                .get(name)
                .map(|p| p.params.clone())
                .ok_or_else(|| ParamError::UnknownPreset(name.to_string()))?,
            None => self
                .get(DEFAULT_PRESET)
                .map(|p| p.params.clone())
                .unwrap_or_default(),
        };

        let channels = if overrides.channels.trim().is_empty() {
            base.channels
        } else {
            ChannelLayout::parse_choice(&overrides.channels)?
        };

        Ok(ConversionParams {
            video_bitrate: pick(&overrides.video_bitrate, base.video_bitrate),
            resolution: pick(&overrides.resolution, base.resolution),
            fps: pick(&overrides.fps, base.fps),
            audio_bitrate: pick(&overrides.audio_bitrate, base.audio_bitrate),
            sample_rate: pick(&overrides.sample_rate, base.sample_rate),
            channels,
        })
    }
}

fn pick(user: &str, preset: Option<String>) -> Option<String> {
    non_empty(Some(user)).or(preset)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
