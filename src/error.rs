//! Error handling for camflow

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or cyclic workflow definition, bad capture configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Workflow node type with no entry in the capability table
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Detector model key that does not resolve
    #[error("Unknown model type: {0}")]
    UnknownModelType(String),

    /// Known capability with no provider behind it
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Capture source read/open failure (retried by the capture worker)
    #[error("Transient source error: {0}")]
    TransientSource(String),

    /// A single frame pipeline stage failed
    #[error("Stage {stage} failed: {message}")]
    StageProcessing { stage: &'static str, message: String },

    /// Workflow handler failure, carries the failing node
    #[error("Workflow execution failed at node {node_id}: {message}")]
    WorkflowExecution { node_id: String, message: String },

    /// Broadcast transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Unknown camera or session
    #[error("Not found: {0}")]
    ResourceNotFound(String),

    /// Worker pool exhausted
    #[error("Over capacity: {0}")]
    OverCapacity(String),

    /// Caller supplied deadline expired
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        Error::StageProcessing {
            stage,
            message: message.into(),
        }
    }

    /// Stable machine-readable code, also used in API bodies
    pub fn code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "CONFIGURATION_ERROR",
            Error::UnknownNodeType(_) => "UNKNOWN_NODE_TYPE",
            Error::UnknownModelType(_) => "UNKNOWN_MODEL_TYPE",
            Error::NotImplemented(_) => "NOT_IMPLEMENTED",
            Error::TransientSource(_) => "TRANSIENT_SOURCE_ERROR",
            Error::StageProcessing { .. } => "STAGE_PROCESSING_ERROR",
            Error::WorkflowExecution { .. } => "WORKFLOW_EXECUTION_ERROR",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::ResourceNotFound(_) => "NOT_FOUND",
            Error::OverCapacity(_) => "OVER_CAPACITY",
            Error::Timeout(_) => "TIMEOUT",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Http(_) => "HTTP_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::Configuration(_)
            | Error::UnknownNodeType(_)
            | Error::UnknownModelType(_) => StatusCode::BAD_REQUEST,
            Error::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Error::WorkflowExecution { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            Error::OverCapacity(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Http(_) | Error::Transport(_) | Error::TransientSource(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::StageProcessing { .. }
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let message = self.to_string();

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let mut body = json!({
            "error_code": error_code,
            "message": message
        });
        if let Error::WorkflowExecution { node_id, .. } = &self {
            body["node_id"] = json!(node_id);
        }

        (status, Json(body)).into_response()
    }
}
