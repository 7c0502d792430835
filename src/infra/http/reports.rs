use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use reportgen_api_types::{ReportAccepted, ReportRequest as WireReportRequest};
use tracing::info;

use crate::domain::{error::DomainError, request::ReportRequest};

use super::{ApiState, error::ApiError};

/// Validate a report request and queue it for the worker.
pub async fn submit_report(
    State(state): State<ApiState>,
    Json(body): Json<WireReportRequest>,
) -> Result<(StatusCode, Json<ReportAccepted>), ApiError> {
    let claimed_id = Some(body.report_id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_owned);

    let request = ReportRequest::try_from(body).map_err(|err| {
        let error = match err {
            DomainError::MissingField { .. } => {
                ApiError::invalid_input("ReportId and WebhookUrl are required", err.to_string())
            }
            DomainError::InvalidWebhookUrl { .. } => {
                ApiError::invalid_input("WebhookUrl must be a valid absolute URL", err.to_string())
            }
        };
        match claimed_id {
            Some(id) => error.for_report(id),
            None => error,
        }
    })?;

    state
        .queue
        .publish(&request)
        .await
        .map_err(|err| {
            ApiError::queue_unavailable(err.to_string()).for_report(request.report_id())
        })?;

    info!(
        target = "reportgen::http::reports",
        report_id = request.report_id(),
        "report request accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(ReportAccepted {
            message: format!("Report {} queued for processing.", request.report_id()),
        }),
    ))
}

pub async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::*;
    use crate::application::queue::{QueueError, ReportQueue};

    #[derive(Default)]
    struct MemoryQueue {
        published: Mutex<Vec<ReportRequest>>,
        offline: bool,
    }

    #[async_trait]
    impl ReportQueue for MemoryQueue {
        async fn publish(&self, request: &ReportRequest) -> Result<(), QueueError> {
            if self.offline {
                return Err(QueueError::unavailable("connection reset"));
            }
            self.published.lock().await.push(request.clone());
            Ok(())
        }
    }

    fn state(queue: Arc<MemoryQueue>) -> State<ApiState> {
        State(ApiState { queue })
    }

    #[tokio::test]
    async fn valid_request_is_published() {
        let queue = Arc::new(MemoryQueue::default());
        let body = WireReportRequest::new("123", "https://test.com/webhook", json!({"key1": "value1"}));

        let (status, Json(accepted)) = submit_report(state(queue.clone()), Json(body))
            .await
            .expect("accepted");

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(accepted.message, "Report 123 queued for processing.");
        let published = queue.published.lock().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].report_id(), "123");
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let queue = Arc::new(MemoryQueue::default());
        let body = WireReportRequest::new("", "https://test.com/webhook", json!(null));

        let err = submit_report(state(queue.clone()), Json(body))
            .await
            .expect_err("rejected");

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.report_id(), None);
        assert!(queue.published.lock().await.is_empty());
    }

    #[tokio::test]
    async fn relative_webhook_is_rejected() {
        let queue = Arc::new(MemoryQueue::default());
        let body = WireReportRequest::new("123", "webhook", json!(null));

        let err = submit_report(state(queue), Json(body))
            .await
            .expect_err("rejected");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.report_id(), Some("123"));
    }

    #[tokio::test]
    async fn publish_failure_is_service_unavailable() {
        let queue = Arc::new(MemoryQueue {
            offline: true,
            ..MemoryQueue::default()
        });
        let body = WireReportRequest::new("123", "https://test.com/webhook", json!(null));

        let err = submit_report(state(queue), Json(body))
            .await
            .expect_err("unavailable");
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.report_id(), Some("123"));
    }
}
