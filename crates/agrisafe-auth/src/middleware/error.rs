//! HTTP rendering of [`AuthError`].

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }

        let body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            let value = build_www_authenticate_header(self.code(), &self.to_string());
            if let Ok(value) = HeaderValue::from_str(&value) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, value);
            }
        }

        response
    }
}

/// HTTP status for each error kind.
#[must_use]
pub fn status_for(error: &AuthError) -> StatusCode {
    match error {
        AuthError::InvalidInput { .. }
        | AuthError::CsrfStateMismatch
        | AuthError::NotEligibleForRefresh
        | AuthError::TokenExpired
        | AuthError::TokenAlreadyUsed => StatusCode::BAD_REQUEST,

        AuthError::InvalidSignature
        | AuthError::MalformedToken { .. }
        | AuthError::Expired
        | AuthError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,

        AuthError::TokenNotFound => StatusCode::NOT_FOUND,
        AuthError::EmailAlreadyRegistered => StatusCode::CONFLICT,

        AuthError::CodeExchangeFailed { .. }
        | AuthError::MissingIdToken
        | AuthError::IdTokenVerificationFailed { .. }
        | AuthError::MalformedProfileClaims { .. } => StatusCode::BAD_GATEWAY,

        AuthError::OidcNotConfigured => StatusCode::SERVICE_UNAVAILABLE,

        AuthError::Persistence { .. }
        | AuthError::Configuration { .. }
        | AuthError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format: `Bearer realm="agrisafe", error="token_expired", error_description="..."`
fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped_desc = description.replace('"', "\\\"");
    format!("Bearer realm=\"agrisafe\", error=\"{error}\", error_description=\"{escaped_desc}\"")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AuthError::invalid_input("x"), StatusCode::BAD_REQUEST),
            (AuthError::CsrfStateMismatch, StatusCode::BAD_REQUEST),
            (AuthError::NotEligibleForRefresh, StatusCode::BAD_REQUEST),
            (AuthError::TokenExpired, StatusCode::BAD_REQUEST),
            (AuthError::TokenAlreadyUsed, StatusCode::BAD_REQUEST),
            (AuthError::InvalidSignature, StatusCode::UNAUTHORIZED),
            (AuthError::malformed_token("x"), StatusCode::UNAUTHORIZED),
            (AuthError::Expired, StatusCode::UNAUTHORIZED),
            (AuthError::TokenNotFound, StatusCode::NOT_FOUND),
            (AuthError::EmailAlreadyRegistered, StatusCode::CONFLICT),
            (AuthError::MissingIdToken, StatusCode::BAD_GATEWAY),
            (AuthError::code_exchange_failed("x"), StatusCode::BAD_GATEWAY),
            (AuthError::OidcNotConfigured, StatusCode::SERVICE_UNAVAILABLE),
            (AuthError::persistence("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(status_for(&error), status, "{error:?}");
        }
    }

    #[tokio::test]
    async fn test_unauthorized_response() {
        let response = AuthError::Expired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.starts_with("Bearer"));
        assert!(www_auth.contains("error=\"token_expired\""));
    }

    #[tokio::test]
    async fn test_conflict_has_no_challenge() {
        let response = AuthError::EmailAlreadyRegistered.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_response_body() {
        let response = AuthError::TokenNotFound.into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["error"], "verification_token_not_found");
        assert_eq!(json["message"], "Verification token not found");
    }

    #[test]
    fn test_www_authenticate_header_escaping() {
        let header = build_www_authenticate_header("malformed_token", "bad \"quoted\" part");
        assert!(header.contains("\\\"quoted\\\""));
    }
}
