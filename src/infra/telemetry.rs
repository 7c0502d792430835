use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::{
        jobs::{METRIC_MESSAGES_ACKED, METRIC_MESSAGES_NACKED, METRIC_MESSAGES_RECEIVED},
        webhook::{METRIC_WEBHOOK_DELIVERED, METRIC_WEBHOOK_FAILED},
    },
    config::{LogFormat, LoggingSettings},
};

use super::{broker::METRIC_SETTLE_FAILED, error::InfraError};

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Prefix of the daily-rolling log files; the appender adds `.YYYY-MM-DD`.
pub const LOG_FILE_PREFIX: &str = "worker.log";

/// Install a global tracing subscriber using the provided logging settings.
///
/// When `logging.file_dir` is set, events are also written to daily-rolling files in
/// that directory. The returned guard flushes the file writer on drop and must be held
/// for as long as the process logs.
pub fn init(logging: &LoggingSettings) -> Result<Option<WorkerGuard>, InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    let (file_layer, guard) = match logging.file_dir.as_deref() {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })?;

    Ok(guard)
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_MESSAGES_RECEIVED,
            Unit::Count,
            "Total number of queue deliveries handed to the processor."
        );
        describe_counter!(
            METRIC_MESSAGES_ACKED,
            Unit::Count,
            "Total number of deliveries settled with ack."
        );
        describe_counter!(
            METRIC_MESSAGES_NACKED,
            Unit::Count,
            "Total number of deliveries settled with nack, labelled by requeue."
        );
        describe_counter!(
            METRIC_SETTLE_FAILED,
            Unit::Count,
            "Total number of ack or nack calls rejected by the broker."
        );
        describe_counter!(
            METRIC_WEBHOOK_DELIVERED,
            Unit::Count,
            "Total number of webhook calls answered with a success status."
        );
        describe_counter!(
            METRIC_WEBHOOK_FAILED,
            Unit::Count,
            "Total number of webhook calls that failed, labelled by reason."
        );
    });
}
