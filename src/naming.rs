//! Output file naming.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Extension stripped from input names before `.mp4` is appended.
const INPUT_SUFFIX: &str = ".webm";
const OUTPUT_SUFFIX: &str = ".mp4";

/// How the output file of a job is named.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RenameMode {
    /// `clip.webm` -> `clip.mp4`
    #[default]
    Original,
    /// `clip.webm` -> `converted_clip.mp4`
    Prefix,
    /// `clip.webm` -> `2024-05-01_clip.mp4`
    Date,
    /// Caller-supplied name; falls back to `original` when empty
    Custom,
}

/// Derive the output name for `file_name` using today's local date.
pub fn output_name(file_name: &str, mode: RenameMode, custom: Option<&str>) -> String {
    output_name_on(file_name, mode, custom, Local::now().date_naive())
}

pub fn output_name_on(
    file_name: &str,
    mode: RenameMode,
    custom: Option<&str>,
    today: NaiveDate,
) -> String {
    let base = strip_input_suffix(file_name);
    let name = match mode {
        RenameMode::Original => format!("{}{}", base, OUTPUT_SUFFIX),
        RenameMode::Prefix => format!("converted_{}{}", base, OUTPUT_SUFFIX),
        RenameMode::Date => format!("{}_{}{}", today.format("%Y-%m-%d"), base, OUTPUT_SUFFIX),
        RenameMode::Custom => match custom.map(str::trim).filter(|c| !c.is_empty()) {
            Some(custom) => format!("{}{}", custom, OUTPUT_SUFFIX),
            None => format!("{}{}", base, OUTPUT_SUFFIX),
        },
    };
    sanitize_filename(&name)
}


/// Replace path separators and `..` so a name cannot leave its directory.
pub fn sanitize_filename(name: &str) -> String {
    name.replace(['/', '\\'], "_").replace("..", "_")
}

fn strip_input_suffix(file_name: &str) -> &str {
    let split = file_name.len().saturating_sub(INPUT_SUFFIX.len());
    match (file_name.get(..split), file_name.get(split..)) {
        (Some(base), Some(suffix)) if suffix.eq_ignore_ascii_case(INPUT_SUFFIX) => base,
        _ => file_name,
    }
}
