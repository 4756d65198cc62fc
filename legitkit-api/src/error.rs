//! API error type with an [`IntoResponse`] mapping to structured JSON
//! bodies. Internal error details are logged but never returned to
//! clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// The error payload.
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "UNAUTHORIZED", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error mapped to HTTP status codes.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The upstream ledger could not be reached (502).
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500). Message is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    const fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Internal error messages stay in the logs.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };
        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<legitkit_core::Error> for ApiError {
    fn from(err: legitkit_core::Error) -> Self {
        match err {
            legitkit_core::Error::InvalidInput { .. } => Self::BadRequest(err.to_string()),
            legitkit_core::Error::Network { .. }
            | legitkit_core::Error::ConfirmationTimeout { .. } => Self::Upstream(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_internal_details_are_not_exposed() {
        let response =
            ApiError::Internal("admin signing key unusable".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INTERNAL_ERROR");
        assert!(!json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("signing key"));
    }

    #[tokio::test]
    async fn test_bad_request_carries_its_message() {
        let response = ApiError::BadRequest("account is required".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("account is required"));
    }

    #[test]
    fn test_core_error_mapping() {
        let invalid = legitkit_core::Error::invalid_input("account", "missing");
        assert!(matches!(ApiError::from(invalid), ApiError::BadRequest(_)));

        let network = legitkit_core::Error::Network {
            url: "http://rpc".to_string(),
            status: None,
            error: "unreachable".to_string(),
        };
        assert!(matches!(ApiError::from(network), ApiError::Upstream(_)));

        let signing = legitkit_core::Error::Signing {
            error: "boom".to_string(),
        };
        assert!(matches!(ApiError::from(signing), ApiError::Internal(_)));
    }
}
