use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use common::config::{
    Config, ModelConfig, ServerConfig, DEFAULT_LISTEN_HOST, DEFAULT_LISTEN_PORT,
    DEFAULT_MAX_BODY_BYTES, DEFAULT_WEIGHTS_PATH,
};
use common::MODEL_FEATURES;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "regressor-s prediction server", long_about = None)]
pub struct Args {
    /// TOML config file. When given, it replaces every other option.
    #[arg(short('f'), long)]
    pub config: Option<String>,

    /// Address to listen on.
    #[arg(long, default_value = DEFAULT_LISTEN_HOST, env = "LISTEN_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_LISTEN_PORT, env = "LISTEN_PORT")]
    pub port: u16,

    /// Largest accepted request body, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES, env = "MAX_BODY_BYTES")]
    pub max_body_bytes: usize,

    /// Path to the JSON weight file of the regression model.
    #[arg(short, long, default_value = DEFAULT_WEIGHTS_PATH, env = "MODEL_WEIGHTS")]
    pub weights: PathBuf,
}

impl Args {
    pub fn load_config(&self) -> Result<Config> {
        if let Some(config_path) = &self.config {
            let config = Config::from_file(config_path)
                .with_context(|| format!("Failed to load config from {}", config_path))?;
            info!("Loaded config from {}", config_path);
            return Ok(config);
        }

        let config = Config {
            server: ServerConfig {
                listen_host: self.host.clone(),
                listen_port: self.port,
                max_body_bytes: self.max_body_bytes,
            },
            model: ModelConfig {
                weights_path: self.weights.clone(),
                required_feature_count: MODEL_FEATURES,
            },
        };
        config.check()?;
        Ok(config)
    }
}
