//! FFmpeg argument construction.

use std::path::Path;

use super::types::ConversionParams;

/// Builds the ffmpeg argument list for one conversion.
///
/// Layout: `-i <input> -y`, then one flag/value pair per set parameter in a
/// fixed order (video bitrate, resolution, fps, audio bitrate, sample rate,
/// channels), then the output path. The program name is not included.
pub fn build_ffmpeg_args(
    input_path: &Path,
    output_path: &Path,
    params: &ConversionParams,
) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        input_path.to_string_lossy().to_string(),
        "-y".to_string(), // Overwrite output
    ];

    let pairs = [
        ("-b:v", params.video_bitrate.as_deref()),
        ("-s", params.resolution.as_deref()),
        ("-r", params.fps.as_deref()),
        ("-b:a", params.audio_bitrate.as_deref()),
        ("-ar", params.sample_rate.as_deref()),
        ("-ac", params.channels.as_ref().map(|c| c.count())),
    ];

    for (flag, value) in pairs {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            args.extend([flag.to_string(), value.to_string()]);
        }
    }

    args.push(output_path.to_string_lossy().to_string());

    args
}

/// Formats an argument list for logging, quoting arguments with spaces.
pub fn format_args_for_display(program: &Path, args: &[String]) -> String {
    let mut parts = vec![program.to_string_lossy().to_string()];
    parts.extend(args.iter().map(|arg| {
        if arg.contains(char::is_whitespace) {
            format!("\"{}\"", arg)
        } else {
            arg.clone()
        }
    }));
    parts.join(" ")
}
