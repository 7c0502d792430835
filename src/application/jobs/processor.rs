use std::{any::Any, fmt, sync::Arc};

use metrics::counter;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    application::{
        decode::decode_request,
        render::{RenderError, ReportRenderer},
        webhook::{UNKNOWN_REPORT_ID, WebhookDispatcher, WebhookOutcome},
    },
    domain::request::ReportRequest,
};

pub const METRIC_MESSAGES_RECEIVED: &str = "reportgen_messages_received_total";
pub const METRIC_MESSAGES_ACKED: &str = "reportgen_messages_acked_total";
pub const METRIC_MESSAGES_NACKED: &str = "reportgen_messages_nacked_total";

/// How the broker should settle a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Nack { requeue: bool },
}

/// Stages of the per-message state machine, as recorded in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    Received,
    Decoding,
    DecodeFailed,
    Rendering,
    RenderFailed,
    Dispatching,
    Settled,
}

impl ProcessingStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStage::Received => "received",
            ProcessingStage::Decoding => "decoding",
            ProcessingStage::DecodeFailed => "decode_failed",
            ProcessingStage::Rendering => "rendering",
            ProcessingStage::RenderFailed => "render_failed",
            ProcessingStage::Dispatching => "dispatching",
            ProcessingStage::Settled => "settled",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure after a successful decode. Always worth another attempt.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("renderer panicked: {0}")]
    Panicked(String),
    #[error("render task was cancelled")]
    Cancelled,
}

/// Drives one delivery through decode, render, dispatch and settlement.
///
/// Holds no per-message state, so a single processor is shared by all in-flight
/// deliveries.
#[derive(Clone)]
pub struct ReportJobProcessor {
    renderer: Arc<dyn ReportRenderer>,
    dispatcher: Arc<dyn WebhookDispatcher>,
}

impl ReportJobProcessor {
    pub fn new(renderer: Arc<dyn ReportRenderer>, dispatcher: Arc<dyn WebhookDispatcher>) -> Self {
        Self {
            renderer,
            dispatcher,
        }
    }

    pub async fn process(&self, body: &[u8]) -> Settlement {
        counter!(METRIC_MESSAGES_RECEIVED).increment(1);
        info!(
            target = "reportgen::jobs",
            stage = %ProcessingStage::Received,
            bytes = body.len(),
            "message received"
        );

        debug!(
            target = "reportgen::jobs",
            stage = %ProcessingStage::Decoding,
            "decoding payload"
        );
        let settlement = match decode_request(body) {
            Ok(request) => self.process_request(Arc::new(request)).await,
            Err(err) => {
                warn!(
                    target = "reportgen::jobs",
                    stage = %ProcessingStage::DecodeFailed,
                    error = %err,
                    "discarding undecodable message"
                );
                let url = err.webhook_url().map(Url::as_str).unwrap_or_default();
                let outcome = WebhookOutcome::failure(UNKNOWN_REPORT_ID, format!("Error: {err}"));
                self.dispatcher.dispatch(url, &outcome).await;
                Settlement::Nack { requeue: false }
            }
        };

        record_settlement(settlement);
        settlement
    }

    async fn process_request(&self, request: Arc<ReportRequest>) -> Settlement {
        let report_id = request.report_id();
        info!(
            target = "reportgen::jobs",
            stage = %ProcessingStage::Rendering,
            report_id,
            "rendering report"
        );

        match self.render(Arc::clone(&request)).await {
            Ok(artifact) => {
                info!(
                    target = "reportgen::jobs",
                    stage = %ProcessingStage::Dispatching,
                    report_id,
                    bytes = artifact.len(),
                    "report rendered"
                );
                let outcome = WebhookOutcome::success(
                    report_id,
                    artifact,
                    format!("Report {report_id} generated successfully"),
                );
                self.dispatcher
                    .dispatch(request.webhook_url().as_str(), &outcome)
                    .await;
                Settlement::Ack
            }
            Err(err) => {
                error!(
                    target = "reportgen::jobs",
                    stage = %ProcessingStage::RenderFailed,
                    report_id,
                    error = %err,
                    "report rendering failed; message will be requeued"
                );
                let outcome = WebhookOutcome::failure(report_id, format!("Error: {err}"));
                self.dispatcher
                    .dispatch(request.webhook_url().as_str(), &outcome)
                    .await;
                Settlement::Nack { requeue: true }
            }
        }
    }

    async fn render(&self, request: Arc<ReportRequest>) -> Result<Vec<u8>, ProcessingError> {
        let renderer = Arc::clone(&self.renderer);
        match tokio::task::spawn_blocking(move || renderer.render(&request)).await {
            Ok(result) => result.map_err(ProcessingError::from),
            Err(join) if join.is_panic() => {
                Err(ProcessingError::Panicked(panic_message(join.into_panic())))
            }
            Err(_) => Err(ProcessingError::Cancelled),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn record_settlement(settlement: Settlement) {
    match settlement {
        Settlement::Ack => counter!(METRIC_MESSAGES_ACKED).increment(1),
        Settlement::Nack { requeue } => {
            let requeue = if requeue { "true" } else { "false" };
            counter!(METRIC_MESSAGES_NACKED, "requeue" => requeue).increment(1);
        }
    }
    info!(
        target = "reportgen::jobs",
        stage = %ProcessingStage::Settled,
        settlement = ?settlement,
        "message settled"
    );
}
