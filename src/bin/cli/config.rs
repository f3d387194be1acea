use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlweave::EngineConfig;
use thiserror::Error;

use super::OutputFormat;

/// Settings read from `config.toml`.
#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    data: RawConfig,
}

impl CliConfig {
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let explicit_given = explicit.is_some();
        let path = explicit.or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            Some(config_path) if explicit_given => {
                return Err(ConfigError::Missing {
                    path: config_path.clone(),
                })
            }
            _ => RawConfig::default(),
        };
        if let Some(format) = data.format.as_deref() {
            parse_format(format)?;
        }
        Ok(Self { path, data })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Output format from the file, if set.
    pub fn format(&self) -> Option<OutputFormat> {
        self.data.format.as_deref().and_then(|f| parse_format(f).ok())
    }

    /// Engine settings; `[engine]` keys override the defaults.
    pub fn engine(&self) -> EngineConfig {
        self.data.engine.clone()
    }

    /// Whether `prune` collapses whitespace by default.
    pub fn normalize(&self) -> bool {
        self.data.prune.normalize
    }
}

fn parse_format(value: &str) -> Result<OutputFormat, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        _ => Err(ConfigError::InvalidFormat {
            value: value.to_string(),
        }),
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    prune: PruneSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct PruneSection {
    #[serde(default)]
    normalize: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read CLI config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse CLI config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("CLI config {path} does not exist")]
    Missing { path: PathBuf },
    #[error("output format '{value}' is invalid; expected 'text' or 'json'")]
    InvalidFormat { value: String },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("sqlweave").join("config.toml"))
}
