//! Duration probing with ffprobe.

use crate::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Upper bound for a single probe; ffprobe only reads the container header.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Probe the total media duration of `input` in seconds.
///
/// Runs `ffprobe -v error -show_entries format=duration
/// -of default=noprint_wrappers=1:nokey=1 <input>` and parses the plain
/// decimal it prints.
///
/// # Errors
///
/// - [`Error::ToolNotFound`] / [`Error::Spawn`] if ffprobe cannot start
/// - [`Error::Exited`] if ffprobe fails
/// - [`Error::ParseError`] if the output is not a finite, non-negative number
///   (ffprobe prints `N/A` for streams without a duration) or the probe
///   exceeds [`DEFAULT_PROBE_TIMEOUT`]
pub async fn probe_duration(ffprobe: &Path, input: &Path) -> Result<f64> {
    probe_duration_with_timeout(ffprobe, input, DEFAULT_PROBE_TIMEOUT).await
}

/// [`probe_duration`] with an explicit timeout.
pub async fn probe_duration_with_timeout(
    ffprobe: &Path,
    input: &Path,
    timeout: Duration,
) -> Result<f64> {
    let tool = ffprobe
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "ffprobe".to_string());

    let child = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::spawn(tool.clone(), e))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_elapsed) => {
            return Err(Error::parse_error(
                tool,
                format!("timed out after {:?}", timeout),
            ))
        }
    };

    if !output.status.success() {
        return Err(Error::Exited {
            tool,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_duration(&tool, &String::from_utf8_lossy(&output.stdout))
}

/// Parse ffprobe's plain-text duration output.
pub fn parse_duration(tool: &str, stdout: &str) -> Result<f64> {
    let text = stdout.trim();
    let duration: f64 = text
        .parse()
        .map_err(|_| Error::parse_error(tool, format!("invalid duration {:?}", text)))?;

    if !duration.is_finite() || duration < 0.0 {
        return Err(Error::parse_error(
            tool,
            format!("invalid duration {:?}", text),
        ));
    }

    Ok(duration)
}
