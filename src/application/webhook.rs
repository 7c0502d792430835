//! Best-effort delivery of processing outcomes to caller webhooks.
//!
//! A dispatch makes at most one HTTP attempt. Failures are logged and counted here
//! and never reach the caller, so they cannot influence how a message is settled.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use metrics::counter;
use reportgen_api_types::{WebhookPayload, WebhookStatus};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

pub const METRIC_WEBHOOK_DELIVERED: &str = "reportgen_webhook_delivered_total";
pub const METRIC_WEBHOOK_FAILED: &str = "reportgen_webhook_failed_total";

/// Report id used when a payload could not be decoded far enough to know it.
pub const UNKNOWN_REPORT_ID: &str = "unknown";

/// Result of one processing attempt, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookOutcome {
    report_id: String,
    status: WebhookStatus,
    artifact: Vec<u8>,
    message: String,
}

impl WebhookOutcome {
    pub fn success(
        report_id: impl Into<String>,
        artifact: Vec<u8>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            report_id: report_id.into(),
            status: WebhookStatus::Success,
            artifact,
            message: message.into(),
        }
    }

    pub fn failure(report_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            report_id: report_id.into(),
            status: WebhookStatus::Error,
            artifact: Vec::new(),
            message: message.into(),
        }
    }

    pub fn report_id(&self) -> &str {
        &self.report_id
    }

    pub fn status(&self) -> WebhookStatus {
        self.status
    }

    pub fn artifact(&self) -> &[u8] {
        &self.artifact
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn to_payload(&self) -> WebhookPayload {
        WebhookPayload {
            report_id: self.report_id.clone(),
            status: self.status,
            pdf_base64: STANDARD.encode(&self.artifact),
            message: self.message.clone(),
        }
    }
}

#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    /// Deliver `outcome` to `url`. Never fails from the caller's point of view.
    async fn dispatch(&self, url: &str, outcome: &WebhookOutcome);
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no webhook target is known")]
    MissingTarget,
    #[error("webhook target `{url}` is not a valid URL: {reason}")]
    InvalidTarget { url: String, reason: String },
    #[error("webhook call timed out")]
    Timeout,
    #[error("webhook transport failure: {0}")]
    Transport(String),
    #[error("webhook responded with status {status}")]
    Rejected { status: u16 },
    #[error("failed to build webhook client: {0}")]
    Client(String),
}

impl DeliveryError {
    fn kind(&self) -> &'static str {
        match self {
            DeliveryError::MissingTarget => "missing_target",
            DeliveryError::InvalidTarget { .. } => "invalid_target",
            DeliveryError::Timeout => "timeout",
            DeliveryError::Transport(_) => "transport",
            DeliveryError::Rejected { .. } => "rejected",
            DeliveryError::Client(_) => "client",
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeliveryError::Timeout
        } else {
            DeliveryError::Transport(err.to_string())
        }
    }
}

/// Posts outcomes as JSON over HTTP with a per-call timeout.
#[derive(Clone)]
pub struct HttpWebhookDispatcher {
    client: reqwest::Client,
}

impl HttpWebhookDispatcher {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DeliveryError::Client(err.to_string()))?;
        Ok(Self { client })
    }

    async fn deliver(&self, url: &str, outcome: &WebhookOutcome) -> Result<u16, DeliveryError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(DeliveryError::MissingTarget);
        }
        let target = Url::parse(trimmed).map_err(|err| DeliveryError::InvalidTarget {
            url: trimmed.to_string(),
            reason: err.to_string(),
        })?;

        let response = self
            .client
            .post(target)
            .json(&outcome.to_payload())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(status.as_u16())
    }
}

#[async_trait]
impl WebhookDispatcher for HttpWebhookDispatcher {
    async fn dispatch(&self, url: &str, outcome: &WebhookOutcome) {
        match self.deliver(url, outcome).await {
            Ok(status) => {
                counter!(METRIC_WEBHOOK_DELIVERED).increment(1);
                info!(
                    target = "reportgen::webhook",
                    report_id = outcome.report_id(),
                    outcome = outcome.status().as_str(),
                    status,
                    "webhook delivered"
                );
            }
            Err(err) => {
                counter!(METRIC_WEBHOOK_FAILED, "reason" => err.kind()).increment(1);
                warn!(
                    target = "reportgen::webhook",
                    report_id = outcome.report_id(),
                    outcome = outcome.status().as_str(),
                    url,
                    error = %err,
                    "webhook delivery failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    fn dispatcher() -> HttpWebhookDispatcher {
        HttpWebhookDispatcher::new(Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn payload_encodes_artifact_as_base64() {
        let outcome = WebhookOutcome::success("123", b"%PDF-1.3".to_vec(), "done");
        let payload = outcome.to_payload();

        assert_eq!(payload.pdf_base64, "JVBERi0xLjM=");
        assert_eq!(payload.status, WebhookStatus::Success);
        assert_eq!(payload.message, "done");
    }

    #[test]
    fn failure_outcome_has_empty_artifact() {
        let outcome = WebhookOutcome::failure(UNKNOWN_REPORT_ID, "Error: bad payload");
        assert!(outcome.artifact().is_empty());
        assert_eq!(outcome.to_payload().pdf_base64, "");
        assert_eq!(outcome.status(), WebhookStatus::Error);
    }

    #[tokio::test]
    async fn posts_outcome_json() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("POST")
                .path("/webhook")
                .header("content-type", "application/json")
                .json_body_includes(r#"{"ReportId":"123","Status":"Success","PdfBase64":"AQID"}"#);
            then.status(200);
        });

        let outcome = WebhookOutcome::success("123", vec![1, 2, 3], "Report 123 generated successfully");
        let status = dispatcher()
            .deliver(&server.url("/webhook"), &outcome)
            .await
            .expect("delivered");

        assert_eq!(status, 200);
        mock.assert();
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("POST").path("/webhook");
            then.status(500);
        });

        let outcome = WebhookOutcome::failure("123", "Error: boom");
        let err = dispatcher()
            .deliver(&server.url("/webhook"), &outcome)
            .await
            .expect_err("rejected");

        assert!(matches!(err, DeliveryError::Rejected { status: 500 }));
        mock.assert();
    }

    #[tokio::test]
    async fn empty_and_invalid_targets_fail_without_io() {
        let outcome = WebhookOutcome::failure(UNKNOWN_REPORT_ID, "Error: bad payload");

        let err = dispatcher().deliver("", &outcome).await.expect_err("empty");
        assert!(matches!(err, DeliveryError::MissingTarget));

        let err = dispatcher()
            .deliver("not a url", &outcome)
            .await
            .expect_err("invalid");
        assert!(matches!(err, DeliveryError::InvalidTarget { .. }));
    }

    #[tokio::test]
    async fn dispatch_swallows_transport_errors() {
        // Nothing listens on the discard port.
        let outcome = WebhookOutcome::failure("123", "Error: boom");
        dispatcher()
            .dispatch("http://127.0.0.1:9/webhook", &outcome)
            .await;
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path("/slow");
            then.status(200).delay(Duration::from_millis(500));
        });

        let dispatcher = HttpWebhookDispatcher::new(Duration::from_millis(50)).expect("client");
        let outcome = WebhookOutcome::failure("123", "Error: boom");
        let err = dispatcher
            .deliver(&server.url("/slow"), &outcome)
            .await
            .expect_err("timeout");

        assert!(matches!(err, DeliveryError::Timeout));
    }
}
