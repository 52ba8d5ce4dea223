pub mod facts;
pub mod platforms;
pub mod sysdescr;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::facts::InvalidSubsetError;

/// Error response - {"error": "message"}
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// API error type
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    /// The device could not be reached or refused the session
    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse::new(self.message)),
        )
            .into_response()
    }
}

impl From<InvalidSubsetError> for ApiError {
    fn from(err: InvalidSubsetError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Typed errors that map to a client error keep their status
        if let Some(invalid) = err.downcast_ref::<InvalidSubsetError>() {
            return Self::bad_request(invalid.to_string());
        }
        Self::internal(format!("{:#}", err))
    }
}

/// Healthcheck endpoint - returns 200 OK with status
pub async fn healthcheck() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "netfacts",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_invalid_subset_maps_to_bad_request() {
        let invalid = InvalidSubsetError {
            subset: "bogus".to_string(),
            valid: vec!["default".to_string(), "hardware".to_string()],
        };
        let err: ApiError = anyhow::Error::new(invalid).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message.contains("got bogus"));
    }

    #[test]
    fn test_other_errors_are_internal() {
        let err: ApiError = anyhow!("boom").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "boom");
    }
}
