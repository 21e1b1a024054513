//! Parser for ffmpeg's `-progress` output.
//!
//! With `-progress pipe:1` ffmpeg writes blocks of newline-delimited
//! `key=value` pairs to stdout, each block terminated by `progress=continue`
//! or, for the final block, `progress=end`. Only the elapsed output time and
//! the end marker matter for percentage reporting.

use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

/// A single meaningful entry of the progress stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    /// Output time encoded so far.
    Elapsed(Duration),
    /// The encoder reported `progress=end`.
    End,
}

/// Parse one line of `-progress` output.
///
/// `out_time_us` and `out_time_ms` both carry microseconds (the latter is
/// misnamed by ffmpeg). Values such as `N/A` and unrelated keys yield `None`.
///
/// # Example
///
/// ```
/// use clipforge_av::progress::{parse_progress_line, ProgressEvent};
/// use std::time::Duration;
///
/// assert_eq!(
///     parse_progress_line("out_time_ms=1500000"),
///     Some(ProgressEvent::Elapsed(Duration::from_millis(1500)))
/// );
/// assert_eq!(parse_progress_line("progress=end"), Some(ProgressEvent::End));
/// assert_eq!(parse_progress_line("fps=30.00"), None);
/// ```
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|micros| *micros >= 0)
            .map(|micros| ProgressEvent::Elapsed(Duration::from_micros(micros as u64))),
        "progress" if value.trim() == "end" => Some(ProgressEvent::End),
        _ => None,
    }
}

/// Convert elapsed output time into a percentage of the total duration.
///
/// Returns `None` when the total duration is unknown (zero, negative or not
/// finite); callers keep progress at its previous value in that case.
pub fn progress_percent(elapsed: Duration, total_secs: f64) -> Option<f64> {
    if !total_secs.is_finite() || total_secs <= 0.0 {
        return None;
    }
    let percent = elapsed.as_secs_f64() / total_secs * 100.0;
    Some(percent.clamp(0.0, 100.0))
}

/// Lazy sequence of [`ProgressEvent`]s read from an encoder's stdout.
///
/// The stream is finite: it ends when the underlying reader reaches EOF,
/// which happens when the encoder closes its output. It cannot be restarted;
/// a new encoder process needs a new stream.
pub struct ProgressStream<R> {
    lines: Lines<R>,
    finished: bool,
}

impl<R: AsyncBufRead + Unpin> ProgressStream<R> {
    /// Wrap a buffered reader, typically a `BufReader<ChildStdout>`.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            finished: false,
        }
    }

    /// Read until the next meaningful event, or `None` once the output closes.
    ///
    /// Read errors end the stream as well; the process exit status decides
    /// whether the attempt succeeded.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        while !self.finished {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(event) = parse_progress_line(&line) {
                        return Some(event);
                    }
                }
                Ok(None) => self.finished = true,
                Err(e) => {
                    tracing::debug!("progress stream read error: {}", e);
                    self.finished = true;
                }
            }
        }
        None
    }

    /// Whether the underlying output has closed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
