pub mod dense;

pub use dense::{Activation, DenseLayer, RegressionModel};

use common::FeatureVector;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("input shape mismatch: expected {expected} features, got {actual}")]
    InputShape { expected: usize, actual: usize },
    #[error("model produced a non-finite output")]
    NonFinite,
}

/// A loaded, read-only model shared by every in-flight request.
///
/// Implementations must be safe to call from several threads at once; the
/// gateway never serializes access.
pub trait Predictor: Send + Sync {
    /// Number of features `predict` expects.
    fn input_dim(&self) -> usize;

    fn predict(&self, features: &FeatureVector) -> Result<f32, PredictError>;
}
