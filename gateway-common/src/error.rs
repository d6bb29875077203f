use crate::SafeDisplay;

/// Behavioral error kinds surfaced by the worker pool. These are not a
/// type-per-failure taxonomy; every dispatch, regardless of which verb it
/// served, fails into exactly one of these.
#[derive(Debug, thiserror::Error, Clone)]
pub enum GatewayError {
    #[error("no worker available for this request")]
    NoWorkerAvailable,

    #[error("worker queue is saturated")]
    Overloaded,

    #[error("request deadline exceeded")]
    Timeout,

    #[error("upstream liteserver error: {0}")]
    UpstreamError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("worker slot {index} is quarantined until the operator intervenes")]
    Fatal { index: usize },
}

impl GatewayError {
    /// HTTP status code this error kind maps to, per the gateway's error
    /// handling contract.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::NoWorkerAvailable => 503,
            GatewayError::Overloaded => 503,
            GatewayError::Timeout => 504,
            GatewayError::UpstreamError(_) => 500,
            GatewayError::NotFound(_) => 404,
            GatewayError::Validation(_) => 422,
            GatewayError::Fatal { .. } => 503,
        }
    }

    /// Whether the dispatcher's single local-recovery fallback (any-working
    /// -> archival, used only by `dispatch_any_then_archival`) should be
    /// attempted for this error. Scoped to `UpstreamError` only: a timeout
    /// means the deadline already elapsed, so retrying on another worker
    /// would just re-run the clock rather than recover anything.
    pub fn is_retriable(&self) -> bool {
        matches!(self, GatewayError::UpstreamError(_))
    }
}

impl SafeDisplay for GatewayError {
    fn to_safe_string(&self) -> String {
        match self {
            GatewayError::UpstreamError(msg) => format!("upstream liteserver error: {msg}"),
            other => other.to_string(),
        }
    }
}
