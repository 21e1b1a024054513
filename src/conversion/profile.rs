//! Encoder argument profiles.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the first, fast attempt.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PrimaryProfile {
    /// Video codec (default: libx264).
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    /// x264 preset (default: ultrafast).
    #[serde(default = "default_primary_preset")]
    pub preset: String,
    #[serde(default = "default_crf")]
    pub crf: u32,
    /// Audio codec; `copy` keeps the source stream (default: copy).
    #[serde(default = "default_primary_audio")]
    pub audio_codec: String,
    /// Encoder threads (default: 2).
    #[serde(default = "default_threads")]
    pub threads: u32,
    /// Run through `nice -n <value>` (default: 10). `0` runs the encoder
    /// directly.
    #[serde(default = "default_niceness")]
    pub niceness: Option<i32>,
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_primary_preset() -> String {
    "ultrafast".to_string()
}

fn default_crf() -> u32 {
    28
}

fn default_primary_audio() -> String {
    "copy".to_string()
}

fn default_threads() -> u32 {
    2
}

fn default_niceness() -> Option<i32> {
    Some(10)
}

impl Default for PrimaryProfile {
    fn default() -> Self {
        Self {
            video_codec: default_video_codec(),
            preset: default_primary_preset(),
            crf: default_crf(),
            audio_codec: default_primary_audio(),
            threads: default_threads(),
            niceness: default_niceness(),
        }
    }
}

impl PrimaryProfile {
    /// The `nice` adjustment to apply, if any.
    pub fn nice_level(&self) -> Option<i32> {
        self.niceness.filter(|n| *n != 0)
    }

    /// Full ffmpeg argument list, with progress written to stdout.
    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = input_args(input);
        args.extend([
            "-threads".to_string(),
            self.threads.to_string(),
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
        ]);
        args.extend(container_args());
        args.extend([
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-nostats".to_string(),
        ]);
        args.extend(output_args(output));
        args
    }
}

/// Settings for the slower, more compatible retry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FallbackProfile {
    /// Set to false to fail jobs after the first attempt.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    /// x264 preset (default: veryfast).
    #[serde(default = "default_fallback_preset")]
    pub preset: String,
    #[serde(default = "default_crf")]
    pub crf: u32,
    /// Audio is re-encoded since copying is what usually breaks MP4 muxing.
    #[serde(default = "default_fallback_audio")]
    pub audio_codec: String,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
    #[serde(default = "default_sample_rate")]
    pub audio_sample_rate: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_fallback_preset() -> String {
    "veryfast".to_string()
}

fn default_fallback_audio() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "128k".to_string()
}

fn default_sample_rate() -> u32 {
    44100
}

impl Default for FallbackProfile {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            video_codec: default_video_codec(),
            preset: default_fallback_preset(),
            crf: default_crf(),
            audio_codec: default_fallback_audio(),
            audio_bitrate: default_audio_bitrate(),
            audio_sample_rate: default_sample_rate(),
        }
    }
}

impl FallbackProfile {
    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = input_args(input);
        args.extend([
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            "-ar".to_string(),
            self.audio_sample_rate.to_string(),
        ]);
        args.extend(container_args());
        args.extend(output_args(output));
        args
    }
}

fn input_args(input: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
    ]
}

fn container_args() -> [String; 4] {
    [
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-max_muxing_queue_size".to_string(),
        "9999".to_string(),
    ]
}

fn output_args(output: &Path) -> [String; 2] {
    ["-y".to_string(), output.to_string_lossy().to_string()]
}
