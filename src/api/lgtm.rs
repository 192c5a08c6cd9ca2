//! LGTM comment form and submission
//!
//! Both routes sit behind the auth gate.
//!
//! Submission steps, each terminal on failure:
//! 1. CSRF check (403)
//! 2. Parameter validation (400, no field detail)
//! 3. Comment creation on GitHub; an upstream failure redirects back
//!    to a pre-filled form instead of retrying

use std::collections::{BTreeMap, BTreeSet};

use axum::{
    Router,
    body::Bytes,
    extract::{OriginalUri, Query, State},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::auth::{AuthorizationContext, Session, require_auth, save_session};
use crate::csrf::{self, CSRF_FIELD};
use crate::error::AppError;
use crate::github::NewIssueComment;
use crate::metrics::COMMENTS_TOTAL;
use crate::render::Locals;

/// Host serving LGTM images and vote endpoints
const LGTM_BASE_URL: &str = "http://www.lgtm.in";

/// Fields a submission must carry once `_csrf` is stripped
const REQUIRED_FIELDS: [&str; 5] = ["text", "user", "repo", "number", "hash"];

/// Create the LGTM router
///
/// Routes:
/// - GET /lgtm - Comment form
/// - POST /lgtm - Post the comment
pub fn lgtm_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/lgtm", get(show_form).post(create_comment))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// Markdown badge appended to every LGTM comment
pub fn lgtm_markdown(hash: &str) -> String {
    format!(
        "[![LGTM]({base}/p/{hash})]({base}/i/{hash})\n\n[:+1:]({base}/u/{hash})[:-1:]({base}/r/{hash})",
        base = LGTM_BASE_URL,
        hash = hash
    )
}

/// A validated LGTM submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LgtmRequest {
    pub text: String,
    pub user: String,
    pub repo: String,
    pub number: String,
    pub hash: String,
}

impl LgtmRequest {
    /// Validate submitted fields (with `_csrf` already removed)
    ///
    /// The field names must be exactly [`REQUIRED_FIELDS`], each once and
    /// non-empty. Missing, extra, repeated or empty fields are all the same
    /// `AppError::Validation`.
    pub fn from_fields(fields: Vec<(String, String)>) -> Result<Self, AppError> {
        let field_count = fields.len();
        let mut values: BTreeMap<String, String> = fields.into_iter().collect();
        if values.len() != field_count {
            return Err(AppError::Validation);
        }

        let submitted: BTreeSet<&str> = values.keys().map(String::as_str).collect();
        let required: BTreeSet<&str> = REQUIRED_FIELDS.into_iter().collect();
        if submitted != required {
            return Err(AppError::Validation);
        }

        if values.values().any(|value| value.is_empty()) {
            return Err(AppError::Validation);
        }

        let mut take = |key: &str| values.remove(key).ok_or(AppError::Validation);
        Ok(Self {
            text: take("text")?,
            user: take("user")?,
            repo: take("repo")?,
            number: take("number")?,
            hash: take("hash")?,
        })
    }

    /// Comment text followed by the LGTM badge
    pub fn comment_body(&self) -> String {
        format!("{}\n\n{}", self.text, lgtm_markdown(&self.hash))
    }

    /// Form URL pre-filled with this submission's target
    pub fn retry_location(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("user", &self.user)
            .append_pair("repo", &self.repo)
            .append_pair("number", &self.number)
            .finish();
        format!("/lgtm?{query}")
    }

    fn to_new_comment(&self) -> NewIssueComment {
        NewIssueComment {
            owner: self.user.clone(),
            repo: self.repo.clone(),
            number: self.number.clone(),
            body: self.comment_body(),
        }
    }
}

/// Target issue passed by the bookmarklet
#[derive(Debug, Default, Deserialize)]
struct LgtmFormQuery {
    user: Option<String>,
    repo: Option<String>,
    number: Option<String>,
}

/// GET /lgtm
///
/// Caches the GitHub profile in the session on first use and renders the
/// form with a fresh CSRF token.
async fn show_form(
    State(state): State<AppState>,
    authorization: AuthorizationContext,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<LgtmFormQuery>,
    jar: CookieJar,
    mut session: Session,
) -> Result<Response, AppError> {
    if session.github_login_user.is_none() {
        match authorization.github().get_authenticated_user().await {
            Ok(user) => {
                tracing::info!(login = %user.login, "Cached GitHub user in session");
                session.github_login_user = Some(user);
            }
            Err(error) if error.is_unauthorized() => {
                tracing::warn!("Stored GitHub token was rejected; restarting authorization");
                session.clear_login();
                let jar = save_session(jar, &session, &state.config)?;
                return Ok((jar, Redirect::to(&uri.to_string())).into_response());
            }
            Err(error) => return Err(error.into()),
        }
    }

    let mut locals = Locals::new();
    locals.insert("csrf".into(), json!(csrf::issue_token(&session)?));
    locals.insert(
        "user".into(),
        serde_json::to_value(&session.github_login_user)
            .map_err(|e| AppError::Internal(e.into()))?,
    );
    locals.insert("owner".into(), query.user.map(Value::from).unwrap_or_default());
    locals.insert("repo".into(), query.repo.map(Value::from).unwrap_or_default());
    locals.insert(
        "number".into(),
        query.number.map(Value::from).unwrap_or_default(),
    );

    let page = state.render("lgtm", locals)?;
    let jar = save_session(jar, &session, &state.config)?;

    Ok((jar, page).into_response())
}

/// POST /lgtm
async fn create_comment(
    State(state): State<AppState>,
    authorization: AuthorizationContext,
    jar: CookieJar,
    mut session: Session,
    body: Bytes,
) -> Result<Response, AppError> {
    let mut fields: Vec<(String, String)> =
        url::form_urlencoded::parse(&body).into_owned().collect();

    let submitted_token = fields
        .iter()
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.as_str());
    csrf::verify(&session, submitted_token)?;
    fields.retain(|(key, _)| key != CSRF_FIELD);

    let lgtm = LgtmRequest::from_fields(fields)?;

    match authorization
        .github()
        .create_issue_comment(&lgtm.to_new_comment())
        .await
    {
        Ok(comment) => {
            COMMENTS_TOTAL.with_label_values(&["success"]).inc();
            tracing::info!(
                owner = %lgtm.user,
                repo = %lgtm.repo,
                number = %lgtm.number,
                comment_id = ?comment.id,
                "Posted LGTM comment"
            );

            let mut locals = Locals::new();
            if let Some(url) = comment.html_url {
                locals.insert("commentUrl".into(), json!(url));
            }
            Ok(state.render("lgtm_create", locals)?.into_response())
        }
        Err(error) => {
            COMMENTS_TOTAL.with_label_values(&["failure"]).inc();
            tracing::warn!(
                owner = %lgtm.user,
                repo = %lgtm.repo,
                number = %lgtm.number,
                status = error.status_code,
                message = %error.message,
                "Failed to post LGTM comment"
            );

            let jar = if error.is_unauthorized() {
                session.clear_login();
                save_session(jar, &session, &state.config)?
            } else {
                jar
            };
            Ok((jar, Redirect::to(&lgtm.retry_location())).into_response())
        }
    }
}
