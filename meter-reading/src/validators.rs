//! Request validation
//!
//! Pure checks on raw JSON values. Rules run in a fixed order and the first
//! failure is reported:
//! 1. customer_code is a non-empty string
//! 2. measure_datetime parses to a calendar instant
//! 3. measure_type is WATER or GAS (any case)
//! 4. image is base64, optionally behind an allow-listed `data:` prefix

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::models::MeasureType;

/// MIME types accepted in a `data:` prefix
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/webp",
    "image/heic",
    "image/heif",
    "image/gif",
];

/// First violated rule
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("customer_code must be a non-empty string")]
    CustomerCode,

    #[error("measure_datetime must be a valid ISO-8601 date-time")]
    MeasureDatetime,

    #[error("measure_type must be WATER or GAS")]
    MeasureType,

    #[error("image must be a base64 encoded image: {0}")]
    Image(#[from] ImageRejection),

    #[error("measure_uuid must be a non-empty string")]
    MeasureUuid,

    #[error("confirmed_value must be a number")]
    ConfirmedValue,
}

/// Why an image payload was rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImageRejection {
    #[error("payload is not a string")]
    NotAString,

    #[error("payload is empty")]
    Empty,

    #[error("malformed data URI prefix")]
    MalformedPrefix,

    #[error("unsupported MIME type {0}")]
    UnsupportedMimeType(String),

    #[error("length is not a multiple of 4")]
    BadLength,

    #[error("illegal character at offset {0}")]
    IllegalCharacter(usize),

    #[error("body does not decode")]
    Undecodable,
}

/// Decoded image bytes with their MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// A submission that passed every rule
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    pub customer_code: String,
    pub measured_at: DateTime<Utc>,
    pub measure_type: MeasureType,
    pub image: ImagePayload,
}

/// Validate an upload in rule order
pub fn validate_submission(
    image: &Value,
    customer_code: &Value,
    measure_datetime: &Value,
    measure_type: &Value,
) -> Result<ValidSubmission, ValidationError> {
    let customer_code = match customer_code.as_str() {
        Some(code) if !code.is_empty() => code.to_string(),
        _ => return Err(ValidationError::CustomerCode),
    };

    let measured_at = measure_datetime
        .as_str()
        .and_then(meter_common::time::parse_instant)
        .ok_or(ValidationError::MeasureDatetime)?;

    let measure_type = measure_type
        .as_str()
        .and_then(|text| text.parse::<MeasureType>().ok())
        .ok_or(ValidationError::MeasureType)?;

    let image = match image.as_str() {
        Some(text) => validate_image_payload(text)?,
        None => return Err(ImageRejection::NotAString.into()),
    };

    Ok(ValidSubmission {
        customer_code,
        measured_at,
        measure_type,
        image,
    })
}

/// Validate and decode a base64 image, with or without a `data:` prefix
pub fn validate_image_payload(text: &str) -> Result<ImagePayload, ImageRejection> {
    let (declared_mime, body) = split_data_uri(text)?;

    if body.is_empty() {
        return Err(ImageRejection::Empty);
    }
    if body.len() % 4 != 0 {
        return Err(ImageRejection::BadLength);
    }
    check_alphabet(body)?;

    let bytes = general_purpose::STANDARD
        .decode(body)
        .map_err(|_| ImageRejection::Undecodable)?;

    let mime_type = match declared_mime {
        Some(mime) => normalize_mime(&mime),
        None => sniff_mime(&bytes).to_string(),
    };

    Ok(ImagePayload { mime_type, bytes })
}

/// Validate confirmation input: returns the raw id text and the value
pub fn validate_confirmation(
    measure_uuid: &Value,
    confirmed_value: &Value,
) -> Result<(String, f64), ValidationError> {
    let id = match measure_uuid.as_str() {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => return Err(ValidationError::MeasureUuid),
    };

    let value = confirmed_value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or(ValidationError::ConfirmedValue)?;

    Ok((id, value))
}

/// Split an optional `data:<mime>;base64,` prefix from the body
fn split_data_uri(text: &str) -> Result<(Option<String>, &str), ImageRejection> {
    let Some(rest) = text.strip_prefix("data:") else {
        return Ok((None, text));
    };

    let (mime, body) = rest
        .split_once(";base64,")
        .ok_or(ImageRejection::MalformedPrefix)?;

    let mime = mime.to_ascii_lowercase();
    if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
        return Err(ImageRejection::UnsupportedMimeType(mime));
    }

    Ok((Some(mime), body))
}

/// Base64 alphabet, with at most two `=` and only at the end
fn check_alphabet(body: &str) -> Result<(), ImageRejection> {
    let data_len = body.trim_end_matches('=').len();
    if body.len() - data_len > 2 {
        return Err(ImageRejection::IllegalCharacter(data_len));
    }

    match body[..data_len]
        .bytes()
        .position(|b| !(b.is_ascii_alphanumeric() || b == b'+' || b == b'/'))
    {
        Some(offset) => Err(ImageRejection::IllegalCharacter(offset)),
        None => Ok(()),
    }
}

fn normalize_mime(mime: &str) -> String {
    match mime {
        "image/jpg" => "image/jpeg".to_string(),
        other => other.to_string(),
    }
}

/// Best-effort MIME detection from magic bytes, PNG when unknown
fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}
