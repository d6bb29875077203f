//! The `ok`/`error`/`code` response envelope every REST route renders, and
//! the `axum::response::IntoResponse` glue that turns a `GatewayError` into
//! one.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_common::error::GatewayError;
use gateway_common::SafeDisplay;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct Envelope {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl Envelope {
    pub fn success(result: Value) -> Self {
        Envelope { ok: true, result: Some(result), error: None, code: None }
    }

    pub fn failure(error: &GatewayError) -> Self {
        Envelope { ok: false, result: None, error: Some(error.to_safe_string()), code: Some(error.status_code()) }
    }
}

/// Wraps a successful verb result for a REST handler to return.
pub struct ApiOk(pub Value);

impl IntoResponse for ApiOk {
    fn into_response(self) -> Response {
        Json(Envelope::success(self.0)).into_response()
    }
}

/// Wraps a `GatewayError` so `?` works directly in REST handlers.
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(Envelope::failure(&self.0))).into_response()
    }
}

pub type ApiResult = Result<ApiOk, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_envelope_carries_the_http_status_as_code() {
        let envelope = Envelope::failure(&GatewayError::NoWorkerAvailable);
        assert!(!envelope.ok);
        assert_eq!(envelope.code, Some(503));
        assert!(envelope.error.is_some());
    }

    #[test]
    fn success_envelope_carries_the_result() {
        let envelope = Envelope::success(serde_json::json!({"seqno": 1}));
        assert!(envelope.ok);
        assert_eq!(envelope.result, Some(serde_json::json!({"seqno": 1})));
    }
}
