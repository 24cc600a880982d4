use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::MODEL_FEATURES;

pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: u16 = 5002;
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024;
pub const DEFAULT_WEIGHTS_PATH: &str = "model.json";

#[derive(Debug, Default, Deserialize, Clone, Validate)]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    #[serde(default)]
    #[validate(nested)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ServerConfig {
    #[serde(default = "default_listen_host")]
    #[validate(length(min = 1))]
    pub listen_host: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Requests with a larger body are rejected before it is read.
    #[serde(default = "default_max_body_bytes")]
    #[validate(range(min = 1))]
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ModelConfig {
    #[serde(default = "default_weights_path")]
    pub weights_path: PathBuf,
    #[serde(default = "default_required_feature_count")]
    #[validate(range(min = 1))]
    pub required_feature_count: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: default_weights_path(),
            required_feature_count: default_required_feature_count(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(config_str).with_context(|| "Failed to parse config file")?;
        config.check()?;
        Ok(config)
    }

    /// Runs the field validators and flattens their report into one error.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.listen_host, self.server.listen_port)
    }
}

fn default_listen_host() -> String {
    DEFAULT_LISTEN_HOST.to_string()
}

fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_weights_path() -> PathBuf {
    PathBuf::from(DEFAULT_WEIGHTS_PATH)
}

fn default_required_feature_count() -> usize {
    MODEL_FEATURES
}
