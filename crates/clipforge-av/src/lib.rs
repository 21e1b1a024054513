//! # clipforge-av
//!
//! External encoder plumbing for clipforge.
//!
//! This crate provides functionality for:
//! - Detecting ffmpeg/ffprobe and resolving configured tool paths
//! - Probing total media duration with ffprobe
//! - Spawning encoder processes that can be cancelled and are always reaped
//! - Parsing ffmpeg's `-progress` stream into elapsed-time events
//!
//! ## Example
//!
//! ```no_run
//! use clipforge_av::{probe_duration, EncoderCommand};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> clipforge_av::Result<()> {
//! let duration = probe_duration(Path::new("ffprobe"), Path::new("clip.webm")).await?;
//!
//! let cancel = CancellationToken::new();
//! let mut encoder = EncoderCommand::new("ffmpeg")
//!     .args(["-i", "clip.webm", "-progress", "pipe:1", "-y", "clip.mp4"])
//!     .spawn_with_progress()?;
//! if let Some(mut progress) = encoder.take_progress() {
//!     while let Some(event) = progress.next_event().await {
//!         println!("{event:?} of {duration}s");
//!     }
//! }
//! encoder.wait(&cancel).await?;
//! # Ok(())
//! # }
//! ```

pub mod command;
mod error;
pub mod probe;
pub mod progress;
pub mod tools;

// Re-exports
pub use command::{EncoderCommand, RunningEncoder};
pub use error::{Error, Result};
pub use probe::probe_duration;
pub use progress::{parse_progress_line, progress_percent, ProgressEvent, ProgressStream};
pub use tools::{check_tool, check_tools, get_tool_path, require_tool, resolve_tool, ToolInfo};
