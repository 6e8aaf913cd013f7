//! Stand-in ffmpeg executables for exercising the real subprocess path.
//!
//! Each script receives the exact argument vector the converter builds
//! (`-i <input> -y [flags...] <output>`), so `$2` is the staged input and the
//! last argument is the output path.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that write an executable and then spawn it.
///
/// Spawning from one thread while another still holds a freshly written
/// script open fails with `ETXTBSY`; holding this guard for the whole test
/// avoids that.
pub fn spawn_guard() -> MutexGuard<'static, ()> {
    SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// A shell script posing as ffmpeg.
#[derive(Debug, Clone)]
pub struct FakeFfmpeg {
    path: PathBuf,
}

impl FakeFfmpeg {
    /// Writes an executable `ffmpeg` script with the given body into `dir`.
    #[cfg(unix)]
    pub fn with_script(dir: &Path, body: &str) -> std::io::Result<Self> {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        {
            let mut file = std::fs::File::create(&path)?;
            writeln!(file, "#!/bin/sh")?;
            writeln!(file, "{}", body)?;
            file.sync_all()?;
        }
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(Self { path })
    }

    /// Copies the input to the output and exits 0.
    #[cfg(unix)]
    pub fn copying_input(dir: &Path) -> std::io::Result<Self> {
        Self::with_script(dir, "for last; do :; done\ncat \"$2\" > \"$last\"\nexit 0")
    }

    /// Prints `stderr` and exits with `code` without writing output.
    #[cfg(unix)]
    pub fn failing(dir: &Path, stderr: &str, code: i32) -> std::io::Result<Self> {
        Self::with_script(dir, &format!("printf '%s' '{}' >&2\nexit {}", stderr, code))
    }

    /// Fails for inputs whose content contains `marker`, copies otherwise.
    #[cfg(unix)]
    pub fn failing_on(dir: &Path, marker: &str, stderr: &str) -> std::io::Result<Self> {
        Self::with_script(
            dir,
            &format!(
                "for last; do :; done\n\
                 if grep -q '{}' \"$2\"; then printf '%s' '{}' >&2; exit 1; fi\n\
                 cat \"$2\" > \"$last\"\nexit 0",
                marker, stderr
            ),
        )
    }

    /// Exits 0 without producing any output file.
    #[cfg(unix)]
    pub fn silent_success(dir: &Path) -> std::io::Result<Self> {
        Self::with_script(dir, "exit 0")
    }

    /// Records its arguments, one per line, into `log`, then copies the input.
    #[cfg(unix)]
    pub fn recording_args(dir: &Path, log: &Path) -> std::io::Result<Self> {
        Self::with_script(
            dir,
            &format!(
                "for arg; do printf '%s\\n' \"$arg\" >> '{}'; done\n\
                 for last; do :; done\ncat \"$2\" > \"$last\"\nexit 0",
                log.display()
            ),
        )
    }

    /// Sleeps for `secs` seconds before exiting 0.
    #[cfg(unix)]
    pub fn sleeping(dir: &Path, secs: u64) -> std::io::Result<Self> {
        Self::with_script(dir, &format!("sleep {}\nexit 0", secs))
    }

    /// Path of the script, suitable for `ConverterConfig::ffmpeg_path`.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
