pub mod error;
pub mod handlers;

pub use error::ApiError;

use anyhow::{bail, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use common::{config::Config, FeatureVector};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::info;

use crate::model::Predictor;
use crate::util::shutdown_signal;

/// Prediction Gateway - validates client payloads and runs them through the shared predictor
pub struct PredictionGateway {
    predictor: Arc<dyn Predictor>,
    required_feature_count: usize,
    max_body_bytes: usize,
}

impl PredictionGateway {
    /// Fails when the configured feature count does not match what the predictor accepts.
    pub fn new(predictor: Arc<dyn Predictor>, config: &Config) -> Result<Self> {
        let required_feature_count = config.model.required_feature_count;
        if predictor.input_dim() != required_feature_count {
            bail!(
                "model expects {} features but {} are configured",
                predictor.input_dim(),
                required_feature_count
            );
        }
        Ok(Self {
            predictor,
            required_feature_count,
            max_body_bytes: config.server.max_body_bytes,
        })
    }

    pub fn required_feature_count(&self) -> usize {
        self.required_feature_count
    }

    /// Runs the predictor once on the blocking pool; a panic inside it becomes an error.
    pub async fn predict(&self, features: FeatureVector) -> Result<f32, ApiError> {
        let predictor = Arc::clone(&self.predictor);
        let prediction = tokio::task::spawn_blocking(move || predictor.predict(&features)).await??;
        Ok(prediction)
    }

    /// Run the gateway until a shutdown signal arrives
    pub async fn run(self: Arc<Self>, host: &str, port: u16) -> Result<()> {
        let app = self.create_router();
        let listener = tokio::net::TcpListener::bind((host, port)).await?;

        info!("Prediction gateway listening on {}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(Into::into)
    }

    /// Create API router for the health and prediction endpoints
    pub fn create_router(self: Arc<Self>) -> Router {
        let max_body_bytes = self.max_body_bytes;
        Router::new()
            .route("/", get(handlers::healthcheck))
            .route("/api", post(handlers::predict))
            .fallback(handlers::not_found)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(max_body_bytes))
            .layer(CorsLayer::permissive())
            .with_state(self)
    }
}
