use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use bytes::Bytes;
use futures_util::stream;
use percent_encoding::percent_decode;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use common::{normalize, RawPayload, ValidationError};

use crate::gateway::{error::ApiError, PredictionGateway};
use crate::util::msg::{HealthResponse, PredictionResponse};

const INPUT_FIELD: &str = "input";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";

/// Liveness only: does not touch the predictor.
pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Validate the `input` field, run the model once and return its output.
pub async fn predict(
    State(gateway): State<Arc<PredictionGateway>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PredictionResponse>, ApiError> {
    let now = Instant::now();
    let payload = extract_payload(&headers, body).await?;
    let features = normalize(payload, gateway.required_feature_count())?;
    let prediction = gateway.predict(features).await?;

    debug!(
        "Prediction {} served in {:?}",
        prediction,
        now.elapsed()
    );
    Ok(Json(PredictionResponse { prediction }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Pulls the raw `input` value out of a JSON, url-encoded or multipart body.
pub async fn extract_payload(
    headers: &HeaderMap,
    body: Bytes,
) -> Result<RawPayload, ValidationError> {
    let value = match content_type(headers).as_deref() {
        Some(mime) if is_json(mime) => return json_input(&body),
        Some(FORM_CONTENT_TYPE) => form_field(&body, INPUT_FIELD),
        Some(MULTIPART_CONTENT_TYPE) => multipart_field(headers, body, INPUT_FIELD).await,
        // Only form bodies carry form fields.
        _ => None,
    };
    value
        .map(RawPayload::Bytes)
        .ok_or(ValidationError::MissingInput)
}

fn json_input(body: &[u8]) -> Result<RawPayload, ValidationError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ValidationError::InvalidJson)?;
    let Value::Object(mut fields) = value else {
        return Err(ValidationError::NotAnObject);
    };
    fields
        .remove(INPUT_FIELD)
        .map(RawPayload::from_json)
        .ok_or(ValidationError::MissingInput)
}

/// Lower-cased media type without parameters.
fn content_type(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let mime = raw.split(';').next()?.trim();
    Some(mime.to_ascii_lowercase())
}

fn is_json(mime: &str) -> bool {
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// First value of `name`, decoded to raw bytes. Non UTF-8 bytes are kept so
/// the normalizer can reject them.
fn form_field(body: &[u8], name: &str) -> Option<Vec<u8>> {
    body.split(|b| *b == b'&')
        .filter(|pair| !pair.is_empty())
        .find_map(|pair| {
            let (key, value) = match pair.iter().position(|b| *b == b'=') {
                Some(eq) => (&pair[..eq], &pair[eq + 1..]),
                None => (pair, &pair[pair.len()..]),
            };
            (form_decode(key) == name.as_bytes()).then(|| form_decode(value))
        })
}

fn form_decode(raw: &[u8]) -> Vec<u8> {
    let spaced: Vec<u8> = raw
        .iter()
        .map(|b| if *b == b'+' { b' ' } else { *b })
        .collect();
    percent_decode(&spaced).collect()
}

/// First non-file part called `name`. File uploads are not form fields, and a
/// body that does not parse as multipart has no fields at all.
async fn multipart_field(headers: &HeaderMap, body: Bytes, name: &str) -> Option<Vec<u8>> {
    let raw = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let boundary = multer::parse_boundary(raw).ok()?;
    let body = stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(body, boundary);

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some(name) && field.file_name().is_none() {
            return field.bytes().await.ok().map(|value| value.to_vec());
        }
    }
    None
}
