use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

// Clone so one failure can be handed to every waiter of a coalesced call
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream API error ({status})")]
    Upstream { status: u16, details: Value },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidTask(_) | ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { .. } | ProxyError::Network(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            ProxyError::Upstream { status, details } => json!({
                "error": self.to_string(),
                "details": details,
                "status": status,
            }),
            ProxyError::Network(message) => json!({
                "error": "Failed to reach upstream API",
                "details": message,
            }),
            // never leak internals to the browser
            ProxyError::Internal(_) => json!({ "error": "Internal server error" }),
            _ => json!({ "error": self.to_string() }),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
