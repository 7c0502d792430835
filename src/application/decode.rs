//! Queue payload decoding.

use reportgen_api_types::ReportRequest as WireReportRequest;
use thiserror::Error;
use url::Url;

use crate::domain::{
    error::DomainError,
    request::{REPORT_ID_FIELD, ReportRequest, parse_webhook_url},
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("payload is not a valid report request: {reason}")]
    Malformed { reason: String },
    #[error("payload decoded to an empty request")]
    Empty,
    #[error("required field `{field}` is missing or empty")]
    MissingField {
        field: &'static str,
        /// Callback target named by the payload, when it was usable.
        webhook_url: Option<Url>,
    },
    #[error("webhook url `{url}` is not an absolute URI: {reason}")]
    InvalidWebhookUrl { url: String, reason: String },
}

impl DecodeError {
    fn malformed(err: serde_json::Error) -> Self {
        Self::Malformed {
            reason: err.to_string(),
        }
    }

    /// Webhook target recovered from a partially valid payload.
    pub fn webhook_url(&self) -> Option<&Url> {
        match self {
            DecodeError::MissingField { webhook_url, .. } => webhook_url.as_ref(),
            _ => None,
        }
    }
}

impl From<DomainError> for DecodeError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::MissingField { field } => DecodeError::MissingField {
                field,
                webhook_url: None,
            },
            DomainError::InvalidWebhookUrl { url, reason } => {
                DecodeError::InvalidWebhookUrl { url, reason }
            }
        }
    }
}

/// Decode a raw queue payload into a validated request.
pub fn decode_request(body: &[u8]) -> Result<ReportRequest, DecodeError> {
    let wire: Option<WireReportRequest> =
        serde_json::from_slice(body).map_err(DecodeError::malformed)?;
    let Some(wire) = wire else {
        return Err(DecodeError::Empty);
    };

    if wire.report_id.trim().is_empty() {
        return Err(DecodeError::MissingField {
            field: REPORT_ID_FIELD,
            webhook_url: parse_webhook_url(&wire.webhook_url).ok(),
        });
    }

    Ok(ReportRequest::try_from(wire)?)
}
