//! Turns untrusted client payloads into fixed-length feature vectors.
//!
//! The HTTP layer decides once which shape a payload has ([`RawPayload`]) and
//! [`normalize`] dispatches to one routine per shape. Every failure comes back
//! as a [`ValidationError`] whose `Display` output is the exact message sent to
//! the client.

use serde_json::Value;
use thiserror::Error;

/// Why a payload could not become a [`FeatureVector`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payload must be UTF-8 encoded")]
    NotUtf8,
    #[error("input must be a delimited string or a list of values")]
    UnsupportedPayload,
    #[error("feature at position {position} is empty")]
    EmptyFeature { position: usize },
    #[error("feature at position {position} must be numeric")]
    NonNumericFeature { position: usize },
    #[error("exactly {expected} features are required, received {received}")]
    FeatureCount { expected: usize, received: usize },
    #[error("request body contained invalid JSON")]
    InvalidJson,
    #[error("JSON payload must be an object with an 'input' field")]
    NotAnObject,
    #[error("the 'input' field is required")]
    MissingInput,
}

/// One element of an already-structured payload (e.g. a JSON array).
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(f64),
    /// Anything that is neither a string nor a number: bool, null, nested containers.
    Other,
}

impl Scalar {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => Scalar::Text(s),
            Value::Number(n) => n.as_f64().map(Scalar::Number).unwrap_or(Scalar::Other),
            _ => Scalar::Other,
        }
    }
}

/// The admissible shapes a client may submit the `input` field in.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// Comma separated values.
    Text(String),
    /// Comma separated values that still need UTF-8 decoding.
    Bytes(Vec<u8>),
    /// Values that were already split by the client.
    Sequence(Vec<Scalar>),
    Unsupported,
}

impl RawPayload {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => RawPayload::Text(s),
            Value::Array(items) => {
                RawPayload::Sequence(items.into_iter().map(Scalar::from_json).collect())
            }
            _ => RawPayload::Unsupported,
        }
    }
}

/// Ordered, finite model inputs of exactly the required length.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    /// Checks that every value is finite and that there are exactly `required` of them.
    pub fn from_values(values: Vec<f32>, required: usize) -> Result<Self, ValidationError> {
        if let Some(position) = values.iter().position(|v| !v.is_finite()) {
            return Err(ValidationError::NonNumericFeature { position });
        }
        if values.len() != required {
            return Err(ValidationError::FeatureCount {
                expected: required,
                received: values.len(),
            });
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl AsRef<[f32]> for FeatureVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// Converts `payload` into a vector of exactly `required` features.
///
/// Tokens are validated in submission order and the first bad one is
/// reported with its 0-indexed position. The count is checked once all
/// tokens have been accepted.
pub fn normalize(payload: RawPayload, required: usize) -> Result<FeatureVector, ValidationError> {
    let values = match payload {
        RawPayload::Text(text) => normalize_text(&text)?,
        RawPayload::Bytes(bytes) => normalize_bytes(&bytes)?,
        RawPayload::Sequence(items) => normalize_sequence(&items)?,
        RawPayload::Unsupported => return Err(ValidationError::UnsupportedPayload),
    };
    FeatureVector::from_values(values, required)
}

fn normalize_text(text: &str) -> Result<Vec<f32>, ValidationError> {
    text.split(',')
        .enumerate()
        .map(|(position, token)| parse_token(position, token))
        .collect()
}

fn normalize_bytes(bytes: &[u8]) -> Result<Vec<f32>, ValidationError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ValidationError::NotUtf8)?;
    normalize_text(text)
}

fn normalize_sequence(items: &[Scalar]) -> Result<Vec<f32>, ValidationError> {
    items
        .iter()
        .enumerate()
        .map(|(position, item)| match item {
            Scalar::Text(token) => parse_token(position, token),
            Scalar::Number(n) => finite(position, *n as f32),
            Scalar::Other => Err(ValidationError::NonNumericFeature { position }),
        })
        .collect()
}

fn parse_token(position: usize, token: &str) -> Result<f32, ValidationError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ValidationError::EmptyFeature { position });
    }
    let value = token
        .parse::<f32>()
        .map_err(|_| ValidationError::NonNumericFeature { position })?;
    finite(position, value)
}

// f32 overflow, `nan` and `inf` all parse successfully but are not usable inputs.
fn finite(position: usize, value: f32) -> Result<f32, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NonNumericFeature { position })
    }
}
