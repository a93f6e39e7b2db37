//! Configuration loading and resolution.
//!
//! Lookup order: `--config`, then `CARDHARVEST_CONFIG`, then
//! `~/.cardharvest/config.json`, else built-in defaults. Command-line
//! overrides are applied on top and the result is validated once.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cardharvest::HarvestConfig;

pub const CONFIG_ENV: &str = "CARDHARVEST_CONFIG";

/// `~/.cardharvest`
pub fn home_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cardharvest")
}

/// Where a config file came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Flag(PathBuf),
    Env(PathBuf),
    Home(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Flag(p) | Self::Env(p) | Self::Home(p) => Some(p),
            Self::Defaults => None,
        }
    }
}

/// Resolve the config file without touching process state.
pub fn resolve_config_source(
    explicit: Option<&Path>,
    env_value: Option<String>,
    home: &Path,
) -> ConfigSource {
    if let Some(path) = explicit {
        return ConfigSource::Flag(path.to_path_buf());
    }
    if let Some(p) = env_value.filter(|v| !v.trim().is_empty()) {
        return ConfigSource::Env(PathBuf::from(p));
    }
    let default = home.join("config.json");
    if default.exists() {
        return ConfigSource::Home(default);
    }
    ConfigSource::Defaults
}

/// Values given on the command line that win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub stable_samples: Option<u32>,
    pub out_dir: Option<PathBuf>,
}

impl Overrides {
    pub fn apply(&self, config: &mut HarvestConfig) {
        if let Some(secs) = self.timeout_secs {
            config.detector.timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(ms) = self.poll_interval_ms {
            config.detector.poll_interval_ms = ms;
        }
        if let Some(n) = self.stable_samples {
            config.detector.stable_samples = n;
        }
        if let Some(dir) = &self.out_dir {
            config.export.directory = Some(dir.clone());
        }
    }
}

/// Read the file named by `source`, or the defaults.
pub fn load_from(source: &ConfigSource) -> Result<HarvestConfig> {
    match source.path() {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            HarvestConfig::from_json(&raw)
                .with_context(|| format!("invalid config {}", path.display()))
        }
        None => Ok(HarvestConfig::default()),
    }
}

/// Resolve, load, override, validate.
pub fn load(explicit: Option<&Path>, overrides: &Overrides) -> Result<(HarvestConfig, ConfigSource)> {
    let source = resolve_config_source(explicit, std::env::var(CONFIG_ENV).ok(), &home_dir());
    let mut config = load_from(&source)?;
    overrides.apply(&mut config);
    config.validate().context("invalid command-line override")?;
    tracing::debug!(?source, "configuration loaded");
    Ok((config, source))
}
