use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use regressor_s::gateway::PredictionGateway;
use regressor_s::model::RegressionModel;
use regressor_s::util::{cmd::Args, init_logging};

#[tokio::main]
async fn main() -> Result<()> {
    //parse args
    let args = Args::parse();
    init_logging();

    let config = args.load_config()?;
    info!(
        "Starting regressor-s: listen={}, max_body_bytes={}, features={}",
        config.listen_addr(),
        config.server.max_body_bytes,
        config.model.required_feature_count
    );

    //weights must load before we accept any traffic
    let model = RegressionModel::load(
        &config.model.weights_path,
        config.model.required_feature_count,
    )
    .context("Failed to initialize the regression model")?;

    let gateway = Arc::new(PredictionGateway::new(Arc::new(model), &config)?);
    gateway
        .run(&config.server.listen_host, config.server.listen_port)
        .await?;

    info!("Prediction gateway stopped");
    Ok(())
}
