//! Classification of decoded report parameters.
//!
//! `classify` maps any JSON value onto exactly one [`ParamValue`] variant. Map and
//! list children are left as raw JSON so callers classify them only when they
//! reach them.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Map, Number, Value};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};

/// Text used when a scalar cannot be turned into readable text.
pub const UNREPRESENTABLE_PLACEHOLDER: &str = "<unrepresentable value>";

const DATA_IMAGE_PREFIX: &str = "data:image";
const BASE64_MARKER: &str = "base64,";
const MIN_SIGNATURE_LEN: usize = 4;
const PNG_SIGNATURE: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];
const JPEG_SIGNATURE: [u8; 2] = [0xFF, 0xD8];

/// Borrowed, classified view over a parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue<'a> {
    Null,
    Scalar(Scalar<'a>),
    Image(ImageData),
    Map(&'a Map<String, Value>),
    List(&'a [Value]),
}

impl ParamValue<'_> {
    pub fn is_composite(&self) -> bool {
        matches!(self, ParamValue::Map(_) | ParamValue::List(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar<'a> {
    Text(&'a str),
    /// Keeps the source text of the number, so integers stay exact and
    /// floating point values keep their written precision.
    Number(&'a Number),
    Bool(bool),
    DateTime(OffsetDateTime),
}

impl Scalar<'_> {
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Text(text) => (*text).to_string(),
            Scalar::Number(number) => serde_json::to_string(number)
                .unwrap_or_else(|_| UNREPRESENTABLE_PLACEHOLDER.to_string()),
            Scalar::Bool(value) => value.to_string(),
            Scalar::DateTime(value) => format_timestamp(*value),
        }
    }
}

impl fmt::Display for Scalar<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }

    fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&PNG_SIGNATURE) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&JPEG_SIGNATURE) {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }
}

/// Raw image bytes recognised by their signature. Not yet decoded into pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageProbeError {
    #[error("value is empty")]
    Empty,
    #[error("data URI has no `base64,` marker")]
    MissingBase64Marker,
    #[error("value is not valid base64")]
    NotBase64,
    #[error("decoded payload is too short ({len} bytes)")]
    TooShort { len: usize },
    #[error("decoded payload has no PNG or JPEG signature")]
    UnknownSignature,
}

/// Classify a raw parameter value. Total: every input maps to one variant.
pub fn classify(raw: &Value) -> ParamValue<'_> {
    match raw {
        Value::Null => ParamValue::Null,
        Value::String(text) => classify_text(text),
        Value::Object(map) => ParamValue::Map(map),
        Value::Array(items) => ParamValue::List(items.as_slice()),
        Value::Number(number) => ParamValue::Scalar(Scalar::Number(number)),
        Value::Bool(value) => ParamValue::Scalar(Scalar::Bool(*value)),
    }
}

fn classify_text(text: &str) -> ParamValue<'_> {
    if let Ok(image) = probe_image(text) {
        return ParamValue::Image(image);
    }

    match OffsetDateTime::parse(text, &Rfc3339) {
        Ok(value) => ParamValue::Scalar(Scalar::DateTime(value)),
        Err(_) => ParamValue::Scalar(Scalar::Text(text)),
    }
}

/// Decode a base64 string (optionally a `data:image/...;base64,` URI) and check
/// that it carries a PNG or JPEG signature.
pub fn probe_image(raw: &str) -> Result<ImageData, ImageProbeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ImageProbeError::Empty);
    }

    let payload = strip_data_uri(trimmed)?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| ImageProbeError::NotBase64)?;

    if bytes.len() < MIN_SIGNATURE_LEN {
        return Err(ImageProbeError::TooShort { len: bytes.len() });
    }

    let format = ImageFormat::sniff(&bytes).ok_or(ImageProbeError::UnknownSignature)?;
    Ok(ImageData { format, bytes })
}

fn strip_data_uri(value: &str) -> Result<&str, ImageProbeError> {
    if !value.starts_with(DATA_IMAGE_PREFIX) {
        return Ok(value);
    }

    // ASCII lowercasing keeps byte offsets stable.
    let index = value
        .to_ascii_lowercase()
        .find(BASE64_MARKER)
        .ok_or(ImageProbeError::MissingBase64Marker)?;
    Ok(&value[index + BASE64_MARKER.len()..])
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(value: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    value
        .format(format)
        .unwrap_or_else(|_| UNREPRESENTABLE_PLACEHOLDER.to_string())
}
