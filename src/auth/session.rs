//! Session management
//!
//! Uses HMAC-signed session payloads stored in a cookie.
//! No server-side session storage needed.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::github::GitHubUser;

/// Per-browser session state
///
/// Stored in a signed cookie. Holds the OAuth token, the cached
/// GitHub profile and the secret CSRF tokens are derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Cached profile of the signed-in user
    pub github_login_user: Option<GitHubUser>,
    /// GitHub OAuth access token
    pub oauth_token: Option<String>,
    /// Secret CSRF tokens are derived from
    pub csrf_secret: String,
    /// Pending OAuth `state`, set while the user is at GitHub
    pub oauth_state: Option<String>,
    /// URL to resume after the OAuth callback
    pub return_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Start a fresh session with a new CSRF secret
    pub fn new(max_age_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            github_login_user: None,
            oauth_token: None,
            csrf_secret: crate::csrf::generate_secret(),
            oauth_state: None,
            return_to: None,
            created_at: now,
            expires_at: now + Duration::seconds(max_age_seconds),
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Stored OAuth token, if present and non-empty
    pub fn token(&self) -> Option<&str> {
        self.oauth_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Forget the signed-in user and the stored token
    pub fn clear_login(&mut self) {
        self.github_login_user = None;
        self.oauth_token = None;
    }
}

type HmacSha256 = hmac::Hmac<sha2::Sha256>;

fn session_mac(secret: &str) -> Result<HmacSha256, AppError> {
    use hmac::Mac;

    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AppError::Encryption(e.to_string()))
}

/// Create a signed session token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
pub fn create_session_token(session: &Session, secret: &str) -> Result<String, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::Mac;

    let payload = serde_json::to_string(session).map_err(|e| AppError::Internal(e.into()))?;
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    let mut mac = session_mac(secret)?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a session token
///
/// # Errors
/// Returns `AppError::Auth` if the signature is invalid, the token is
/// malformed or the session has expired
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::Mac;

    let invalid = || AppError::Auth("invalid session".to_string());

    let (payload_b64, signature_b64) = token.split_once('.').ok_or_else(invalid)?;

    let mut mac = session_mac(secret)?;
    mac.update(payload_b64.as_bytes());
    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| invalid())?;
    mac.verify_slice(&signature).map_err(|_| invalid())?;

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| invalid())?;
    let session: Session = serde_json::from_slice(&payload).map_err(|_| invalid())?;

    if session.is_expired() {
        return Err(AppError::Auth("session expired".to_string()));
    }

    Ok(session)
}

/// Load the session carried by the request, or start a new one
///
/// A missing, tampered or expired cookie silently yields a fresh session.
pub fn load_session(jar: &CookieJar, config: &AppConfig) -> Session {
    jar.get(&config.session.cookie_name)
        .and_then(|cookie| verify_session_token(cookie.value(), &config.session.app_key).ok())
        .unwrap_or_else(|| Session::new(config.session.max_age_seconds))
}

/// Build the signed session cookie for a response
pub fn session_cookie(session: &Session, config: &AppConfig) -> Result<Cookie<'static>, AppError> {
    let token = create_session_token(session, &config.session.app_key)?;
    Ok(Cookie::build((config.session.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .build())
}

/// Store the session in the jar returned with the response
pub fn save_session(
    jar: CookieJar,
    session: &Session,
    config: &AppConfig,
) -> Result<CookieJar, AppError> {
    Ok(jar.add(session_cookie(session, config)?))
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    /// Reuse the session loaded by the auth gate, else read the cookie
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(session);
        }

        let state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(load_session(&jar, &state.config))
    }
}
