//! Bearer token authentication middleware.
//!
//! A single shared secret guards the issuance endpoints. Comparison is
//! constant-time; when no token is configured the middleware lets all
//! requests through (development mode).

use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::ApiError;

/// Auth configuration injected into request extensions.
///
/// `Debug` redacts the token so it cannot leak through logs.
#[derive(Clone)]
pub struct AuthConfig {
    /// The expected bearer secret; `None` disables authentication.
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Constant-time comparison of bearer tokens.
///
/// When lengths differ a dummy comparison runs anyway so timing does not
/// reveal the expected length.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Validates the `Authorization: Bearer` header against the configured
/// token before letting the request through.
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let Some(AuthConfig {
        token: Some(expected),
    }) = request.extensions().get::<AuthConfig>().cloned()
    else {
        return next.run(request).await;
    };

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match header_value {
        Some(value) => match value.strip_prefix("Bearer ") {
            Some(provided) if constant_time_token_eq(provided, &expected) => {
                next.run(request).await
            }
            Some(_) => {
                tracing::warn!("authentication failed: invalid bearer token");
                ApiError::Unauthorized("invalid bearer token".to_string()).into_response()
            }
            None => {
                tracing::warn!("authentication failed: non-Bearer authorization scheme");
                ApiError::Unauthorized("authorization header must use Bearer scheme".to_string())
                    .into_response()
            }
        },
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            ApiError::Unauthorized("missing authorization header".to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    fn test_app(token: Option<String>) -> Router {
        Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(AuthConfig { token }))
    }

    #[tokio::test]
    async fn test_valid_bearer_token_accepted() {
        let app = test_app(Some("my-secret".to_string()));
        let request = Request::builder()
            .uri("/test")
            .header("Authorization", "Bearer my-secret")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let app = test_app(Some("my-secret".to_string()));
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_wrong_token_rejected() {
        let app = test_app(Some("my-secret".to_string()));
        let request = Request::builder()
            .uri("/test")
            .header("Authorization", "Bearer wrong")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_rejected() {
        let app = test_app(Some("my-secret".to_string()));
        let request = Request::builder()
            .uri("/test")
            .header("Authorization", "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_auth_disabled_allows_everything() {
        let app = test_app(None);
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_token_eq("secret-token", "secret-token"));
        assert!(!constant_time_token_eq("secret", "secret-token"));
        assert!(!constant_time_token_eq("", "secret-token"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = AuthConfig {
            token: Some("super-secret".to_string()),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("REDACTED"));
    }
}
