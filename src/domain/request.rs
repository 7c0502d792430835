use reportgen_api_types::ReportRequest as WireReportRequest;
use serde_json::Value;
use url::Url;

use super::error::DomainError;

pub const REPORT_ID_FIELD: &str = "ReportId";
pub const WEBHOOK_URL_FIELD: &str = "WebhookUrl";

/// A report request whose identity fields have been validated.
///
/// Immutable once built; each delivery attempt decodes its own copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    report_id: String,
    webhook_url: Url,
    parameters: Value,
}

impl ReportRequest {
    pub fn new(
        report_id: impl Into<String>,
        webhook_url: &str,
        parameters: Value,
    ) -> Result<Self, DomainError> {
        let report_id = report_id.into();
        if report_id.trim().is_empty() {
            return Err(DomainError::missing_field(REPORT_ID_FIELD));
        }

        let webhook_url = parse_webhook_url(webhook_url)?;

        Ok(Self {
            report_id,
            webhook_url,
            parameters,
        })
    }

    pub fn report_id(&self) -> &str {
        &self.report_id
    }

    pub fn webhook_url(&self) -> &Url {
        &self.webhook_url
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    /// Queue payload shape of this request.
    pub fn to_wire(&self) -> WireReportRequest {
        WireReportRequest::new(
            self.report_id.clone(),
            self.webhook_url.as_str(),
            self.parameters.clone(),
        )
    }
}

impl TryFrom<WireReportRequest> for ReportRequest {
    type Error = DomainError;

    fn try_from(wire: WireReportRequest) -> Result<Self, Self::Error> {
        ReportRequest::new(wire.report_id, &wire.webhook_url, wire.parameters)
    }
}

/// Parse a webhook target, requiring a non-empty absolute URI.
pub fn parse_webhook_url(raw: &str) -> Result<Url, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::missing_field(WEBHOOK_URL_FIELD));
    }

    Url::parse(trimmed).map_err(|err| DomainError::invalid_webhook_url(trimmed, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_absolute_webhook_url() {
        let request = ReportRequest::new("123", "https://test.com/webhook", json!(null))
            .expect("valid request");

        assert_eq!(request.report_id(), "123");
        assert_eq!(request.webhook_url().as_str(), "https://test.com/webhook");
        assert!(request.parameters().is_null());
    }

    #[test]
    fn rejects_blank_report_id() {
        let err = ReportRequest::new("  ", "https://test.com/webhook", json!(null))
            .expect_err("blank id");

        assert_eq!(err, DomainError::missing_field(REPORT_ID_FIELD));
    }

    #[test]
    fn rejects_relative_webhook_url() {
        let err = ReportRequest::new("123", "/webhook", json!(null)).expect_err("relative url");

        assert!(matches!(err, DomainError::InvalidWebhookUrl { .. }));
    }

    #[test]
    fn rejects_empty_webhook_url() {
        let err = ReportRequest::new("123", "", json!(null)).expect_err("empty url");

        assert_eq!(err, DomainError::missing_field(WEBHOOK_URL_FIELD));
    }
}
