//! Locating ffmpeg, ffprobe and nice.
//!
//! A configured path wins when it exists; otherwise `PATH` is searched.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Availability report for one external program.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line the program printed for its version flag.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

impl ToolInfo {
    fn missing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        }
    }
}

/// Locate `name` and run it with `version_arg` to confirm it works.
///
/// # Example
///
/// ```no_run
/// use clipforge_av::check_tool;
///
/// let info = check_tool("ffprobe", None, "-version");
/// if info.available {
///     println!("ffprobe: {:?}", info.version);
/// }
/// ```
pub fn check_tool(name: &str, config_path: Option<&Path>, version_arg: &str) -> ToolInfo {
    let Ok(path) = get_tool_path(name, config_path) else {
        return ToolInfo::missing(name);
    };

    match Command::new(&path).arg(version_arg).output() {
        Ok(output) if output.status.success() => ToolInfo {
            name: name.to_string(),
            available: true,
            version: String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string),
            path: Some(path),
        },
        _ => ToolInfo::missing(name),
    }
}

/// Check everything a conversion shells out to.
///
/// `nice` is optional at runtime; it is only used when a niceness is set.
pub fn check_tools(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> Vec<ToolInfo> {
    vec![
        check_tool("ffmpeg", ffmpeg, "-version"),
        check_tool("ffprobe", ffprobe, "-version"),
        check_tool("nice", None, "--version"),
    ]
}

/// Find `name` on `PATH`.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::tool_not_found(name))
}

/// Prefer `config_path` when it exists, otherwise search `PATH`.
pub fn get_tool_path(name: &str, config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) if path.exists() => Ok(path.to_path_buf()),
        Some(path) => {
            tracing::warn!("Configured {} path {:?} does not exist, searching PATH", name, path);
            require_tool(name)
        }
        None => require_tool(name),
    }
}

/// Resolve a tool path without failing.
///
/// Falls back to the bare program name so that spawning reports a
/// [`Error::ToolNotFound`] at conversion time instead of at startup.
pub fn resolve_tool(name: &str, config_path: Option<&Path>) -> PathBuf {
    get_tool_path(name, config_path).unwrap_or_else(|_| PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_reports_unavailable() {
        let info = check_tool("nonexistent_tool_12345", None, "-version");
        assert!(!info.available);
        assert!(info.version.is_none());
        assert!(info.path.is_none());
    }

    #[test]
    fn test_require_tool_missing() {
        let err = require_tool("nonexistent_tool_12345").unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }

    #[test]
    fn test_configured_path_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("ffmpeg");
        std::fs::write(&fake, b"").unwrap();
        let path = get_tool_path("nonexistent_tool_12345", Some(&fake)).unwrap();
        assert_eq!(path, fake);
    }

    #[test]
    fn test_stale_configured_path_searches_path() {
        let missing = Path::new("/nonexistent/bin/nonexistent_tool_12345");
        assert!(get_tool_path("nonexistent_tool_12345", Some(missing)).is_err());
    }

    #[test]
    fn test_resolve_tool_falls_back_to_name() {
        let path = resolve_tool("nonexistent_tool_12345", None);
        assert_eq!(path, PathBuf::from("nonexistent_tool_12345"));
    }

    #[cfg(unix)]
    #[test]
    fn test_version_line_is_captured() {
        let echo = check_tool("echo", None, "tool 1.2.3");
        assert!(echo.available);
        assert_eq!(echo.version.as_deref(), Some("tool 1.2.3"));
    }
}
