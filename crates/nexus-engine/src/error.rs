use http::StatusCode;
use nexus_core::HttpError;
use thiserror::Error;

/// Errors that can occur while serving a chat-completion request.
///
/// The variants correspond to the error kinds that matter for routing and
/// failover decisions, not to individual upstream failure modes: adapters
/// collapse their own errors into `UpstreamAttempt` or `CommittedStream`
/// depending on whether the stream had already produced a chunk.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Client sent a malformed or invalid request
    #[error("invalid request: {0}")]
    Validation(String),

    /// Request lacks required authentication credentials
    #[error("authentication required")]
    Unauthorized,

    /// An adapter failed before producing its first chunk
    #[error("upstream attempt failed: {0}")]
    UpstreamAttempt(String),

    /// An adapter failed after the stream had already committed to the client
    #[error("committed stream failed: {0}")]
    CommittedStream(String),

    /// Every candidate upstream was tried and none committed
    #[error("no upstream was able to serve this request")]
    Exhaustion,

    /// Client disconnected before the request completed
    #[error("request cancelled")]
    Cancelled,

    /// Request arrived while the process was shutting down
    #[error("server is shutting down")]
    ShuttingDown,
}

impl GatewayError {
    /// Whether this error should trigger a failover attempt at the next
    /// candidate rather than surfacing immediately to the client.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamAttempt(_))
    }
}

impl HttpError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UpstreamAttempt(_) | Self::CommittedStream(_) | Self::Exhaustion => {
                StatusCode::BAD_GATEWAY
            }
            Self::Cancelled => StatusCode::BAD_REQUEST,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Validation(_) => "invalid_request_error",
            Self::Unauthorized => "authentication_error",
            Self::UpstreamAttempt(_) => "upstream_error",
            Self::CommittedStream(_) => "streaming_error",
            Self::Exhaustion => "exhaustion_error",
            Self::Cancelled => "cancelled_error",
            Self::ShuttingDown => "shutting_down_error",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}
