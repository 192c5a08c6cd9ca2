//! Error types for the LGTM bookmarklet service
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` so every failure is answered
//! at the request boundary with a fixed status and no internal detail.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

/// Failure reported by the GitHub REST API.
///
/// `status_code` is the upstream HTTP status; transport failures
/// (timeouts, connection errors) use 504 and 502 respectively.
#[derive(Debug, Clone, Error)]
#[error("GitHub API error {status_code}: {message}")]
pub struct UpstreamApiError {
    pub status_code: u16,
    pub message: String,
}

impl UpstreamApiError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    /// The stored token was rejected (revoked or expired)
    pub fn is_unauthorized(&self) -> bool {
        self.status_code == StatusCode::UNAUTHORIZED.as_u16()
    }
}

impl From<reqwest::Error> for UpstreamApiError {
    fn from(err: reqwest::Error) -> Self {
        let status_code = if err.is_timeout() {
            StatusCode::GATEWAY_TIMEOUT.as_u16()
        } else {
            err.status()
                .map(|status| status.as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY.as_u16())
        };
        Self::new(status_code, err.to_string())
    }
}

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// OAuth exchange failed or token absent (401)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Submitted CSRF token missing or mismatched (403)
    #[error("Invalid CSRF token")]
    Csrf,

    /// Malformed form submission (400)
    #[error("Bad Request")]
    Validation,

    /// GitHub API call failed (502)
    #[error(transparent)]
    UpstreamApi(#[from] UpstreamApiError),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    fn error_type(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "auth",
            AppError::Csrf => "csrf",
            AppError::Validation => "validation",
            AppError::UpstreamApi(_) => "upstream_api",
            AppError::Config(_) => "config",
            AppError::Encryption(_) => "encryption",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Only the fixed public message of each variant is sent to the client.
    fn into_response(self) -> Response {
        use crate::metrics::ERRORS_TOTAL;

        let error_type = self.error_type();
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        match &self {
            AppError::Auth(reason) => {
                tracing::warn!(%reason, "Authentication failed");
                (StatusCode::UNAUTHORIZED, Html(AUTH_FAILURE_PAGE)).into_response()
            }
            AppError::Csrf => {
                tracing::warn!("Rejected request with invalid CSRF token");
                (StatusCode::FORBIDDEN, "Forbidden").into_response()
            }
            AppError::Validation => (StatusCode::BAD_REQUEST, "Bad Request").into_response(),
            AppError::UpstreamApi(err) => {
                tracing::error!(
                    status = err.status_code,
                    message = %err.message,
                    "GitHub API request failed"
                );
                (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
            }
            AppError::Config(_) | AppError::Encryption(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, error_type, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

/// Fallback page for authentication failures outside the renderer
const AUTH_FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>LGTM.in GitHub Bookmarklet</title></head>
<body>
  <h1>Sign in failed</h1>
  <p>GitHub authorization did not complete. <a href="/lgtm">Try again</a>.</p>
</body>
</html>"#;
