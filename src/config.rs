//! Advisor configuration loaded from TOML with `GUNSMITH_` environment overrides.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entities::PlayerContext;

pub const ENV_PREFIX: &str = "GUNSMITH_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    ParseError(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Catalog snapshot written by the data fetcher.
    pub catalog: PathBuf,
    pub tasks: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("catalog.json"),
            tasks: PathBuf::from("tasks.json"),
            export_dir: PathBuf::from("."),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Player assumed when a command does not say otherwise.
    pub player: PlayerContext,
    pub paths: PathsConfig,
    pub logging: LoggingConfig,
}

/// Loads `path` over the defaults, then applies `GUNSMITH_` variables
/// (`GUNSMITH_PLAYER__LEVEL=30`). A missing file leaves the defaults in place.
pub fn load_config(path: &Path) -> Result<AdvisorConfig, ConfigError> {
    Figment::from(Serialized::defaults(AdvisorConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AdvisorConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
