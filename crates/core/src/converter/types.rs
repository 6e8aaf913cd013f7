//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::error::ParamError;

/// Output container/format offered to users.
///
/// The catalog is fixed; ffmpeg infers codecs from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Amv,
    Avi,
    Mp3,
    Mkv,
    Mov,
    Flv,
    Wmv,
    Wav,
    Aac,
    Ogg,
    Mp4,
}

impl OutputFormat {
    /// All formats, in the order they are presented to users.
    pub const ALL: [OutputFormat; 11] = [
        Self::Amv,
        Self::Avi,
        Self::Mp3,
        Self::Mkv,
        Self::Mov,
        Self::Flv,
        Self::Wmv,
        Self::Wav,
        Self::Aac,
        Self::Ogg,
        Self::Mp4,
    ];

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Amv => "amv",
            Self::Avi => "avi",
            Self::Mp3 => "mp3",
            Self::Mkv => "mkv",
            Self::Mov => "mov",
            Self::Flv => "flv",
            Self::Wmv => "wmv",
            Self::Wav => "wav",
            Self::Aac => "aac",
            Self::Ogg => "ogg",
            Self::Mp4 => "mp4",
        }
    }

    /// Whether the format carries audio only.
    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::Mp3 | Self::Wav | Self::Aac | Self::Ogg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extension() == wanted)
            .ok_or_else(|| ParamError::UnknownFormat(s.to_string()))
    }
}

/// Audio channel layout choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    /// Human-readable label, as shown in the channel selector.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mono => "1 (Mono)",
            Self::Stereo => "2 (Stereo)",
        }
    }

    /// Channel count passed to ffmpeg: the leading numeric token of the label.
    pub fn count(&self) -> &'static str {
        self.label().split_whitespace().next().unwrap_or_default()
    }

    /// Parses a channel choice.
    ///
    /// Returns `Ok(None)` for the explicit "Default" choice, which leaves the
    /// channel count untouched.
    pub fn parse_choice(s: &str) -> Result<Option<Self>, ParamError> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower == "default" {
            return Ok(None);
        }
        if lower == "mono" {
            return Ok(Some(Self::Mono));
        }
        if lower == "stereo" {
            return Ok(Some(Self::Stereo));
        }
        match lower.split_whitespace().next() {
            Some("1") => Ok(Some(Self::Mono)),
            Some("2") => Ok(Some(Self::Stereo)),
            _ => Err(ParamError::InvalidChannels(trimmed.to_string())),
        }
    }
}

/// Transcoding parameters applied to every file of a batch.
///
/// Every field is either unset or a non-empty value; unset fields produce no
/// ffmpeg flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionParams {
    /// Video bitrate, e.g. "800k".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_bitrate: Option<String>,
    /// Frame size as "WxH".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Frame rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<String>,
    /// Audio bitrate, e.g. "128k".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<String>,
    /// Audio sample rate in Hz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<String>,
    /// Audio channel layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<ChannelLayout>,
}

impl ConversionParams {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Raw user-entered overrides, one per parameter field.
///
/// Empty or whitespace-only values mean "no override".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamOverrides {
    #[serde(default)]
    pub video_bitrate: String,
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub fps: String,
    #[serde(default)]
    pub audio_bitrate: String,
    #[serde(default)]
    pub sample_rate: String,
    #[serde(default)]
    pub channels: String,
}

/// A file uploaded for conversion.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Original file name.
    pub name: String,
    /// Raw file content.
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// File name without its extension.
    pub fn base_name(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    /// Extension of the original name (without the dot), if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name).extension().and_then(|e| e.to_str())
    }

    /// Name of the converted output for the given format.
    pub fn output_name(&self, format: OutputFormat) -> String {
        format!("{}_converted.{}", self.base_name(), format.extension())
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}

/// A successfully converted file.
#[derive(Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    /// Output file name, `<base>_converted.<format>`.
    pub name: String,
    /// Converted content.
    pub data: Vec<u8>,
}

impl fmt::Debug for ConvertedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertedFile")
            .field("name", &self.name)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}
