use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("required field `{field}` is missing or empty")]
    MissingField { field: &'static str },
    #[error("webhook url `{url}` is not an absolute URI: {reason}")]
    InvalidWebhookUrl { url: String, reason: String },
}

impl DomainError {
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    pub fn invalid_webhook_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidWebhookUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
