//! Subprocess wrappers around `ffmpeg`/`ffprobe` (spec §4.12). Always
//! invoked with an explicit argument vector, never a shell, per the piped
//! stdio / `wait_with_output` pattern.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

const FFMPEG_TIMEOUT: Duration = Duration::from_secs(600);
const FFPROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FfmpegError {
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{binary} timed out after {timeout_secs}s")]
    Timeout { binary: &'static str, timeout_secs: u64 },
    #[error("{binary} exited with status {status}: {stderr}")]
    NonZeroExit {
        binary: &'static str,
        status: String,
        stderr: String,
    },
    #[error("could not parse {binary} output as a duration: {output}")]
    UnparseableDuration { binary: &'static str, output: String },
}

/// Runs `ffmpeg -y <args>`, capturing stdout/stderr, bounded by
/// [`FFMPEG_TIMEOUT`]. A non-zero exit surfaces stderr verbatim.
pub async fn run_ffmpeg(args: &[&str]) -> Result<Vec<u8>, FfmpegError> {
    let mut full_args = vec!["-y"];
    full_args.extend_from_slice(args);
    run_capturing("ffmpeg", &full_args, FFMPEG_TIMEOUT).await
}

/// Runs `ffprobe <args>`, bounded by [`FFPROBE_TIMEOUT`].
pub async fn run_ffprobe(args: &[&str]) -> Result<Vec<u8>, FfmpegError> {
    run_capturing("ffprobe", args, FFPROBE_TIMEOUT).await
}

async fn run_capturing(binary: &'static str, args: &[&str], timeout: Duration) -> Result<Vec<u8>, FfmpegError> {
    let mut cmd = Command::new(binary);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let child = cmd.spawn().map_err(|source| FfmpegError::Spawn { binary, source })?;
    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| FfmpegError::Timeout {
            binary,
            timeout_secs: timeout.as_secs(),
        })?
        .map_err(|source| FfmpegError::Spawn { binary, source })?;

    if !output.status.success() {
        return Err(FfmpegError::NonZeroExit {
            binary,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(output.stdout)
}

/// Returns the duration, in seconds, of the media file at `path`, via
/// `ffprobe -show_entries format=duration -of default=noprint_wrappers=1:nokey=1`.
pub async fn get_duration_seconds(path: &Path) -> Result<f64, FfmpegError> {
    let path_str = path.to_string_lossy();
    let args = [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
        path_str.as_ref(),
    ];
    let stdout = run_ffprobe(&args).await?;
    let text = String::from_utf8_lossy(&stdout);
    text.trim()
        .parse::<f64>()
        .map_err(|_| FfmpegError::UnparseableDuration {
            binary: "ffprobe",
            output: text.trim().to_string(),
        })
}
