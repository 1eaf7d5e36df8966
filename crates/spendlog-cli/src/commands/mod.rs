//! Subcommands.

pub mod config;
pub mod import;
pub mod scan;

use std::path::{Path, PathBuf};

use spendlog_core::SpendlogConfig;

/// `<config dir>/spendlog/config.json`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spendlog")
        .join("config.json")
}

/// The `--config` path if given, otherwise the default location.
pub fn resolve_config_path(config_path: Option<&str>) -> PathBuf {
    config_path.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Read the config at `path`. A missing file yields defaults unless `must_exist`.
pub fn read_config(path: &Path, must_exist: bool) -> anyhow::Result<SpendlogConfig> {
    if !must_exist && !path.exists() {
        return Ok(SpendlogConfig::default());
    }
    SpendlogConfig::from_file(path)
        .map_err(|e| anyhow::anyhow!("Cannot read config {}: {}", path.display(), e))
}

/// Config for a command run. A path given with `--config` must exist.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<SpendlogConfig> {
    read_config(&resolve_config_path(config_path), config_path.is_some())
}
