//! Wire types shared by the ingestion endpoint, the queue payload and webhook callbacks.
//!
//! Field names follow the PascalCase convention used by existing callers
//! (`ReportId`, `WebhookUrl`, ...). camelCase spellings are accepted on input.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to render a report, as published to the work queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportRequest {
    #[serde(alias = "reportId", default)]
    pub report_id: String,
    #[serde(alias = "webhookUrl", default)]
    pub webhook_url: String,
    /// Arbitrary nested JSON; absent parameters decode as `null`.
    #[serde(alias = "parameters", default)]
    pub parameters: Value,
}

impl ReportRequest {
    pub fn new(
        report_id: impl Into<String>,
        webhook_url: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            report_id: report_id.into(),
            webhook_url: webhook_url.into(),
            parameters,
        }
    }
}

/// Outcome of a processing attempt as seen by the callback receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookStatus {
    Success,
    Error,
}

impl WebhookStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WebhookStatus::Success => "Success",
            WebhookStatus::Error => "Error",
        }
    }
}

/// JSON body posted to the caller's webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebhookPayload {
    pub report_id: String,
    pub status: WebhookStatus,
    /// Base64 (standard alphabet, padded) of the rendered PDF; empty on failure.
    pub pdf_base64: String,
    pub message: String,
}

/// Body returned with `202 Accepted` once a request has been queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportAccepted {
    pub message: String,
}
