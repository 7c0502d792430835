//! Per-message report processing.

mod processor;

pub use processor::{
    METRIC_MESSAGES_ACKED, METRIC_MESSAGES_NACKED, METRIC_MESSAGES_RECEIVED, ProcessingError,
    ProcessingStage, ReportJobProcessor, Settlement,
};
