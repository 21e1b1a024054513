pub mod persist;
mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./clipforge.toml",
        "./config.toml",
        "~/.config/clipforge/config.toml",
        "/etc/clipforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let engine = &config.engine;
    if engine.max_concurrent == 0 {
        anyhow::bail!("engine.max_concurrent must be at least 1");
    }
    if !(engine.cpu_threshold > 0.0 && engine.cpu_threshold <= 100.0) {
        anyhow::bail!(
            "engine.cpu_threshold must be in (0, 100], got {}",
            engine.cpu_threshold
        );
    }
    if engine.poll_interval_ms == 0 || engine.throttled_interval_ms == 0 {
        anyhow::bail!("engine poll intervals must be greater than 0");
    }
    if engine.event_buffer == 0 {
        anyhow::bail!("engine.event_buffer must be at least 1");
    }

    if config.conversion.deadline_secs == 0 {
        anyhow::bail!("conversion.deadline_secs must be greater than 0");
    }

    let storage = &config.storage;
    if storage.upload_dir == storage.output_dir {
        anyhow::bail!("storage.upload_dir and storage.output_dir must differ");
    }

    // Watch paths may be mounted later, so only warn
    for path in &config.watch.paths {
        if !path.exists() {
            tracing::warn!("Watch path does not exist: {:?}", path);
        }
        if path == &storage.upload_dir {
            anyhow::bail!("Watch path {:?} cannot be the upload directory", path);
        }
    }
    if config.watch.enabled && config.watch.extensions.is_empty() {
        anyhow::bail!("watch.extensions cannot be empty when watching is enabled");
    }

    Ok(())
}
