use async_trait::async_trait;
use thiserror::Error;

use crate::domain::request::ReportRequest;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

impl QueueError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Durable destination for validated report requests.
#[async_trait]
pub trait ReportQueue: Send + Sync {
    async fn publish(&self, request: &ReportRequest) -> Result<(), QueueError>;
}
