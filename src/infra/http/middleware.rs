use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation id shared by the response log and the `x-request-id` response header.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Reuse the caller's `x-request-id` when it is usable, otherwise mint one, and echo it back.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: incoming_request_id(request.headers())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

fn incoming_request_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let usable = !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value.chars().all(|ch| ch.is_ascii_graphic());
    usable.then(|| value.to_owned())
}

/// What the response log records about a failed submission.
#[derive(Debug, PartialEq)]
struct FailureSummary {
    source: &'static str,
    detail: String,
    chain: Vec<String>,
    report_id: String,
}

impl FailureSummary {
    fn from_report(report: Option<ErrorReport>) -> Self {
        let Some(report) = report else {
            return Self {
                source: "unknown",
                detail: "no diagnostic available".to_string(),
                chain: Vec::new(),
                report_id: "-".to_string(),
            };
        };

        Self {
            source: report.source,
            detail: report
                .messages
                .first()
                .cloned()
                .unwrap_or_else(|| "no diagnostic available".to_string()),
            report_id: report.report_id.unwrap_or_else(|| "-".to_string()),
            chain: report.messages,
        }
    }
}

/// Logs every 4xx/5xx response with its [`ErrorReport`] and the report id it concerned.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let start = Instant::now();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let elapsed_ms = start.elapsed().as_millis();
    let summary = FailureSummary::from_report(response.extensions_mut().remove::<ErrorReport>());

    if status.is_server_error() {
        error!(
            target = "reportgen::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            source = summary.source,
            report_id = %summary.report_id,
            detail = %summary.detail,
            chain = ?summary.chain,
            request_id = %request_id,
            "report submission failed",
        );
    } else {
        warn!(
            target = "reportgen::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            source = summary.source,
            report_id = %summary.report_id,
            detail = %summary.detail,
            chain = ?summary.chain,
            request_id = %request_id,
            "report submission rejected",
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(value).expect("header"));
        headers
    }

    #[test]
    fn caller_request_id_is_reused() {
        assert_eq!(
            incoming_request_id(&headers(" trace-42 ")).as_deref(),
            Some("trace-42")
        );
    }

    #[test]
    fn unusable_request_ids_are_ignored() {
        assert_eq!(incoming_request_id(&HeaderMap::new()), None);
        assert_eq!(incoming_request_id(&headers("")), None);
        assert_eq!(incoming_request_id(&headers("has space")), None);
        assert_eq!(incoming_request_id(&headers(&"x".repeat(129))), None);
    }

    #[test]
    fn summary_names_the_report() {
        let report = ErrorReport::from_message(
            "infra::http::api",
            StatusCode::SERVICE_UNAVAILABLE,
            "queue_unavailable: connection reset",
        )
        .with_report_id(Some("123".into()));

        let summary = FailureSummary::from_report(Some(report));
        assert_eq!(summary.source, "infra::http::api");
        assert_eq!(summary.detail, "queue_unavailable: connection reset");
        assert_eq!(summary.report_id, "123");
        assert_eq!(summary.chain.len(), 1);
    }

    #[test]
    fn summary_without_report_uses_placeholders() {
        let summary = FailureSummary::from_report(None);
        assert_eq!(summary.source, "unknown");
        assert_eq!(summary.report_id, "-");
        assert!(summary.chain.is_empty());
    }
}
