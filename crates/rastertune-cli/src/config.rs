//! CLI configuration, persisted as TOML under the user config dir.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rastertune_core::PerfParams;

/// Persisted application configuration.
///
/// `[performance]` holds the default performance parameters; a sweep only
/// rewrites it when the user explicitly accepts the winning trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub performance: PerfParams,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Last directory a benchmark report was written to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_output_dir: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            performance: PerfParams::default(),
            logging: LoggingConfig::default(),
            last_output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// One of `pretty`, `compact`, `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl CliConfig {
    /// Default location of the config file.
    pub fn default_config_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("no user configuration directory")?;
        Ok(base.join("rastertune").join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("parsing configuration {}", path.display()))
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("serializing configuration")?;
        std::fs::write(path, raw)
            .with_context(|| format!("writing configuration {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = CliConfig::default();
        config.performance = PerfParams { tile_size: 768, cache_mib: 4096, threads: 12 };
        config.last_output_dir = Some(PathBuf::from("/data/reports"));
        config.save(&path).unwrap();

        let loaded = CliConfig::load(&path).unwrap();
        assert_eq!(loaded.performance, config.performance);
        assert_eq!(loaded.last_output_dir, config.last_output_dir);
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config.performance, PerfParams::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\nformat = \"json\"\n").unwrap();

        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.performance, PerfParams::default());
        assert!(config.last_output_dir.is_none());
    }
}
