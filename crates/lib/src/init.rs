//! Initialize the configuration directory: create ~/.yuanzhang with a default config and quotes file.
//!
//! The bundled quotes live in `crates/lib/config/quotes.json`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

static DEFAULT_QUOTES: &str = include_str!("../config/quotes.json");

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Writes `quotes.json` from the bundled list if missing.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let quotes = config_dir.join("quotes.json");
    if !quotes.exists() {
        std::fs::write(&quotes, DEFAULT_QUOTES)
            .with_context(|| format!("writing default quotes to {}", quotes.display()))?;
        log::info!("wrote default quotes to {}", quotes.display());
    } else {
        log::debug!("quotes file already exists at {}, skipping", quotes.display());
    }

    Ok(config_dir.to_path_buf())
}
