//! Error types for clipforge-av.

use std::process::ExitStatus;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving external media tools.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// The tool process could not be started.
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but exited unsuccessfully.
    #[error("{tool} exited with {status}: {stderr}")]
    Exited {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    /// The tool was killed because its run was cancelled.
    #[error("{tool} was cancelled and terminated")]
    Cancelled { tool: String },

    /// Failed to parse tool output.
    #[error("failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a parse error.
    pub fn parse_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Map a spawn failure, turning `NotFound` into [`Error::ToolNotFound`].
    pub fn spawn(tool: impl Into<String>, source: std::io::Error) -> Self {
        let tool = tool.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::ToolNotFound { tool }
        } else {
            Self::Spawn { tool, source }
        }
    }

    /// Whether this error came from cancellation rather than the tool itself.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_not_found_maps_to_tool_not_found() {
        let err = Error::spawn(
            "ffmpeg",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(matches!(err, Error::ToolNotFound { ref tool } if tool == "ffmpeg"));
        assert_eq!(err.to_string(), "tool not found: ffmpeg");
    }

    #[test]
    fn spawn_other_error_kept() {
        let err = Error::spawn(
            "ffmpeg",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, Error::Spawn { .. }));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn cancelled_is_flagged() {
        let err = Error::Cancelled {
            tool: "ffmpeg".into(),
        };
        assert!(err.is_cancelled());
    }
}
