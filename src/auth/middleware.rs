//! Authentication gate
//!
//! Protects routes that act on GitHub as the signed-in user.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use super::oauth::begin_authorization;
use super::session::{load_session, save_session};
use crate::AppState;
use crate::error::AppError;
use crate::github::GitHubClient;

/// Capability to call GitHub as the signed-in user
///
/// Attached to the request by [`require_auth`]; derived from the
/// session's OAuth token and dropped with the request.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    github: GitHubClient,
}

impl AuthorizationContext {
    pub fn new(github: GitHubClient) -> Self {
        Self { github }
    }

    pub fn github(&self) -> &GitHubClient {
        &self.github
    }
}

/// Middleware to require a GitHub authorization
///
/// With a stored token the request continues with an
/// [`AuthorizationContext`] and the loaded session in its extensions.
/// Without one the browser is sent through GitHub OAuth and resumes
/// the original URL afterwards.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/lgtm", ...)
///     .route_layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let mut session = load_session(&jar, &state.config);

    if let Some(token) = session.token() {
        let github = GitHubClient::new(
            state.http_client.as_ref().clone(),
            &state.config.github.api_base_url,
            token,
        );
        request
            .extensions_mut()
            .insert(AuthorizationContext::new(github));
        request.extensions_mut().insert(session);

        return Ok(next.run(request).await);
    }

    let return_to = request
        .uri()
        .path_and_query()
        .map(|path_and_query| path_and_query.as_str().to_string());

    tracing::debug!(return_to = ?return_to, "No GitHub token in session; starting OAuth");

    let location = begin_authorization(&state.config, &mut session, return_to)?;
    let jar = save_session(jar, &session, &state.config)?;

    Ok((jar, Redirect::to(&location)).into_response())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthorizationContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthorizationContext>()
            .cloned()
            .ok_or_else(|| AppError::Auth("route is not behind the auth gate".to_string()))
    }
}
