pub mod config;
pub mod normalize;

pub use normalize::{normalize, FeatureVector, RawPayload, Scalar, ValidationError};

/// Number of features the regression model was trained on.
pub const MODEL_FEATURES: usize = 13;
