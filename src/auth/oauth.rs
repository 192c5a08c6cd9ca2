//! GitHub OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with GitHub.

use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::REFERER},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use base64::Engine;
use rand::RngCore;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use url::Url;

use super::session::{Session, save_session};
use crate::AppState;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::metrics::OAUTH_EXCHANGES_TOTAL;
use crate::render::Locals;

/// Create authentication router
///
/// Routes:
/// - GET /auth/github/callback - OAuth callback
/// - GET /out - Sign out
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/github/callback", get(github_callback))
        .route("/out", get(logout))
}

// =============================================================================
// Authorization request
// =============================================================================

/// Record a pending authorization in the session and return GitHub's
/// authorization URL
///
/// The URL carries client_id, redirect_uri, the configured scope and a
/// random `state` that the callback must echo back.
pub(crate) fn begin_authorization(
    config: &AppConfig,
    session: &mut Session,
    return_to: Option<String>,
) -> Result<String, AppError> {
    let state = generate_oauth_state();

    let mut url = Url::parse(&config.github.authorize_url)
        .map_err(|e| AppError::Config(format!("github.authorize_url is invalid: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.github.client_id)
        .append_pair("redirect_uri", &config.oauth_callback_url())
        .append_pair("scope", &config.github.scope)
        .append_pair("state", &state);

    session.oauth_state = Some(state);
    session.return_to = return_to.filter(|path| is_local_path(path));

    Ok(url.into())
}

fn generate_oauth_state() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Only same-site paths may be resumed after login
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from GitHub callback
#[derive(Debug, Deserialize)]
struct GitHubCallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// CSRF state token
    state: Option<String>,
    /// Set when the user denied access
    error: Option<String>,
}

/// GitHub token response
#[derive(Debug, Deserialize)]
struct GitHubTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /auth/github/callback
///
/// # Steps
/// 1. Verify the `state` against the pending authorization
/// 2. Exchange code for access token
/// 3. Store the token and redirect to the URL that started the flow
///
/// On failure the session is left untouched and a failure page is shown.
async fn github_callback(
    State(state): State<AppState>,
    Query(query): Query<GitHubCallbackQuery>,
    jar: CookieJar,
    mut session: Session,
) -> Result<Response, AppError> {
    let token = match authorize_callback(&state, &session, &query).await {
        Ok(token) => token,
        Err(error) => {
            OAUTH_EXCHANGES_TOTAL.with_label_values(&["failure"]).inc();
            tracing::warn!(%error, "GitHub authorization failed");
            let page = state.render("auth_failure", Locals::new())?;
            return Ok((StatusCode::UNAUTHORIZED, page).into_response());
        }
    };

    OAUTH_EXCHANGES_TOTAL.with_label_values(&["success"]).inc();

    session.oauth_token = Some(token);
    session.github_login_user = None;
    session.oauth_state = None;
    let target = session
        .return_to
        .take()
        .filter(|path| is_local_path(path))
        .unwrap_or_else(|| "/".to_string());

    let jar = save_session(jar, &session, &state.config)?;
    tracing::info!(%target, "GitHub authorization completed");

    Ok((jar, Redirect::to(&target)).into_response())
}

async fn authorize_callback(
    state: &AppState,
    session: &Session,
    query: &GitHubCallbackQuery,
) -> Result<String, AppError> {
    if let Some(error) = &query.error {
        return Err(AppError::Auth(format!("authorization denied: {error}")));
    }

    let expected = session
        .oauth_state
        .as_deref()
        .ok_or_else(|| AppError::Auth("no pending authorization".to_string()))?;
    let provided = query.state.as_deref().unwrap_or_default();
    if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        return Err(AppError::Auth("state mismatch".to_string()));
    }

    let code = query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::Auth("missing authorization code".to_string()))?;

    exchange_code(&state.http_client, &state.config, code).await
}

/// Exchange an authorization code for an access token
///
/// Single round trip; any failure (network, timeout, OAuth error) is
/// reported as `AppError::Auth`.
async fn exchange_code(
    http_client: &reqwest::Client,
    config: &AppConfig,
    code: &str,
) -> Result<String, AppError> {
    let started = std::time::Instant::now();
    let result = http_client
        .post(&config.github.token_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .json(&serde_json::json!({
            "client_id": config.github.client_id,
            "client_secret": config.github.client_secret,
            "code": code,
            "redirect_uri": config.oauth_callback_url(),
        }))
        .send()
        .await;
    crate::metrics::observe_upstream("oauth_token", started.elapsed());

    let response = result
        .map_err(|e| AppError::Auth(format!("token exchange request failed: {e}")))?
        .error_for_status()
        .map_err(|e| AppError::Auth(format!("token exchange rejected: {e}")))?;

    let token_response: GitHubTokenResponse = response
        .json()
        .await
        .map_err(|e| AppError::Auth(format!("invalid token response: {e}")))?;

    if let Some(error) = token_response.error {
        let description = token_response.error_description.unwrap_or_default();
        return Err(AppError::Auth(format!("{error}: {description}")));
    }

    token_response
        .access_token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| AppError::Auth("no access_token in response".to_string()))
}

// =============================================================================
// Logout
// =============================================================================

/// GET /out
///
/// Forgets the cached user and the token, then sends the browser back.
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    mut session: Session,
) -> Result<impl IntoResponse, AppError> {
    session.clear_login();
    let jar = save_session(jar, &session, &state.config)?;

    let target = back_target(&headers, &state.config);
    Ok((jar, Redirect::to(&target)))
}

/// Referring page when it belongs to this service, else `/`
fn back_target(headers: &HeaderMap, config: &AppConfig) -> String {
    let base_url = config.server.base_url();
    headers
        .get(REFERER)
        .and_then(|value| value.to_str().ok())
        .filter(|referer| {
            is_local_path(referer) || referer.strip_prefix(&base_url).is_some_and(is_local_path)
        })
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| "/".to_string())
}
