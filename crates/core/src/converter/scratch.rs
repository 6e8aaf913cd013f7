//! Scoped scratch files for a single conversion.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir, TempPath};
use tracing::{debug, warn};

use super::types::UploadedFile;

/// Temporary input file and output location owned by one conversion.
///
/// Both live under the converter's temp directory with random names, so
/// concurrent conversions never collide. Everything is removed when the value
/// is dropped; removal failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct Scratch {
    input: Option<TempPath>,
    output_dir: Option<TempDir>,
    output_path: PathBuf,
}

impl Scratch {
    /// Writes the uploaded bytes to a fresh temp file and reserves an output
    /// path named `output_name` inside a fresh temp directory.
    ///
    /// The input keeps the original extension so ffmpeg can detect its container. The
    /// write handle is closed before this returns.
    pub async fn stage(
        temp_dir: &Path,
        file: &UploadedFile,
        output_name: &str,
    ) -> io::Result<Self> {
        tokio::fs::create_dir_all(temp_dir).await?;

        let suffix = file
            .extension()
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();

        let input = Builder::new()
            .prefix("convertino-in-")
            .suffix(&suffix)
            .tempfile_in(temp_dir)?
            .into_temp_path();

        // The guard owns the input from here on, so early returns still clean up.
        let mut scratch = Self {
            input: Some(input),
            output_dir: None,
            output_path: PathBuf::new(),
        };

        let output_dir = Builder::new()
            .prefix("convertino-out-")
            .tempdir_in(temp_dir)?;
        scratch.output_path = output_dir.path().join(output_name);
        scratch.output_dir = Some(output_dir);

        tokio::fs::write(scratch.input_path(), &file.data).await?;

        debug!(
            input = %scratch.input_path().display(),
            output = %scratch.output_path.display(),
            bytes = file.data.len(),
            "Staged scratch files"
        );

        Ok(scratch)
    }

    /// Path of the staged input file.
    pub fn input_path(&self) -> &Path {
        self.input.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Path ffmpeg should write to.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if let Some(input) = self.input.take() {
            let path = input.to_path_buf();
            if let Err(e) = input.close() {
                warn!(path = %path.display(), error = %e, "Failed to remove scratch input");
            }
        }

        if let Some(dir) = self.output_dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(path = %path.display(), error = %e, "Failed to remove scratch output");
            }
        }
    }
}
