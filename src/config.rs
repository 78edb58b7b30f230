use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_CONFIG_PATH: &str = "~/.config/podkeeper/config.toml";

/// Runtime configuration, passed explicitly to everything that needs it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one JSON document per podcast
    pub feed_dir: PathBuf,
    /// Root directory for downloaded media
    pub download_dir: PathBuf,
    /// Number of concurrent feed fetches or downloads
    pub parallelism: usize,
    /// HTTP timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_dir: PathBuf::from("~/.local/share/podkeeper/feeds"),
            download_dir: PathBuf::from("~/Podcasts"),
            parallelism: 4,
            timeout_secs: 30,
            user_agent: concat!("podkeeper/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Load the configuration file
    ///
    /// Without an explicit path the default location is used, and a missing
    /// default file yields the defaults. Paths starting with `~` are expanded.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = expand_path(Path::new(DEFAULT_CONFIG_PATH));
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!("no config at {}, using defaults", default_path.display());
                    Self::default()
                }
            }
        };
        Ok(config.expanded())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Copy with `~` expanded in every path
    pub fn expanded(self) -> Self {
        Self {
            feed_dir: expand_path(&self.feed_dir),
            download_dir: expand_path(&self.download_dir),
            ..self
        }
    }
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(text) => PathBuf::from(shellexpand::tilde(text).into_owned()),
        None => path.to_path_buf(),
    }
}
