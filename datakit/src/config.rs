use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use common::FileFormat;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::line_reader::ReadOptions;
use crate::output_streams::OutputStreamsConfig;
use crate::scheduler::SchedulerConfig;

pub const DEFAULT_CONFIG_FILE: &str = "datakit.yaml";
pub const CONFIG_ENV_VAR: &str = "DATAKIT_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub scheduler: SchedulerConfig,
    pub output: OutputStreamsConfig,
    pub read: ReadOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            scheduler: SchedulerConfig::default(),
            output: OutputStreamsConfig::default(),
            read: ReadOptions::default(),
        }
    }
}

/// Where the values of a loaded [`Config`] came from.
#[derive(Debug)]
pub enum ConfigSource {
    File,
    Missing,
    Invalid(anyhow::Error),
}

impl ConfigSource {
    pub fn log(&self, path: &Path) {
        match self {
            ConfigSource::File => info!("Loaded config from {}", path.display()),
            ConfigSource::Missing => info!("No config at {}, using defaults", path.display()),
            ConfigSource::Invalid(err) => {
                warn!("Ignoring config {}: {err:#}", path.display())
            }
        }
    }
}

impl Config {
    /// The file named by `DATAKIT_CONFIG`, or `datakit.yaml`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Loads the file at `path`, falling back to defaults when it is missing
    /// or invalid, and logs which of the two happened.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let (config, source) = Self::load_with_source(path);
        source.log(path);
        config
    }

    /// Like [`Config::load_or_default`] but hands the outcome back instead of
    /// logging it, for callers that install the logger from the result.
    pub fn load_with_source(path: impl AsRef<Path>) -> (Self, ConfigSource) {
        let path = path.as_ref();
        if !path.exists() {
            return (Self::default(), ConfigSource::Missing);
        }

        match Self::load(path) {
            Ok(config) => (config, ConfigSource::File),
            Err(err) => (Self::default(), ConfigSource::Invalid(err)),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let format = FileFormat::from_file_name(path)?;
        let serialized = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: Self = common::serde::deserialize(&serialized, format)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let serialized = common::serde::serialize(self, FileFormat::from_file_name(path)?)?;
        std::fs::write(path, serialized)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scheduler.max_concurrency == 0 {
            bail!("scheduler.max_concurrency must be > 0");
        }
        if self.log_level.trim().is_empty() {
            bail!("log_level must not be empty");
        }
        Ok(())
    }
}
