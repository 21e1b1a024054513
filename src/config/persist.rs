//! Configuration persistence using toml_edit to keep comments in generated files.

use super::Config;
use anyhow::{Context, Result};
use std::path::Path;
use toml_edit::DocumentMut;

const SECTION_COMMENTS: &[(&str, &str)] = &[
    ("engine", "# Admission control: concurrency cap, CPU gate and poll cadence\n"),
    ("storage", "# Where inputs are staged and outputs are written\n"),
    ("conversion", "# Per-job deadline, output retention and encoder profiles\n"),
    ("tools", "# Explicit tool paths; leave unset to search PATH\n"),
    ("watch", "# Drop folders picked up automatically by `clipforge start`\n"),
];

/// Render a config as a commented TOML document.
pub fn to_document(config: &Config) -> Result<DocumentMut> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    let mut doc: DocumentMut = content
        .parse()
        .context("Failed to parse serialized config")?;

    for (section, comment) in SECTION_COMMENTS {
        if let Some(table) = doc.get_mut(section).and_then(|item| item.as_table_mut()) {
            table.decor_mut().set_prefix(format!("\n{}", comment));
        }
    }

    Ok(doc)
}

/// Save the entire config to a TOML file
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let doc = to_document(config)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    std::fs::write(path, doc.to_string())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}

/// Write a default config file, refusing to overwrite unless `force` is set.
pub fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {:?} (use --force to overwrite)",
            path
        );
    }
    save_config(path, &Config::default())
}
