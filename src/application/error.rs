use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::{application::render::RenderError, config::LoadError, infra::error::InfraError};

/// Diagnostic attached to error responses for the response logger.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
    /// Report the failed request was about, when the body carried one.
    pub report_id: Option<String>,
}

impl ErrorReport {
    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
            report_id: None,
        }
    }

    pub fn with_report_id(mut self, report_id: Option<String>) -> Self {
        self.report_id = report_id;
        self
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Top-level failure of a command run by the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error("failed to prepare renderer: {0}")]
    Render(#[from] RenderError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_attaches_to_response_extensions() {
        let mut response = Response::new(axum::body::Body::empty());
        ErrorReport::from_message("test", StatusCode::BAD_GATEWAY, "upstream closed")
            .with_report_id(Some("r-9".into()))
            .attach(&mut response);

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.messages, vec!["upstream closed"]);
        assert_eq!(report.status, StatusCode::BAD_GATEWAY);
        assert_eq!(report.report_id.as_deref(), Some("r-9"));
    }

    #[test]
    fn load_errors_convert_into_app_errors() {
        let err: AppError = LoadError::Invalid {
            key: "broker.port",
            reason: "port must be greater than zero".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "failed to load configuration: invalid configuration for `broker.port`: port must be greater than zero"
        );
    }
}
