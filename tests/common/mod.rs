//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use lgtm_bookmarklet::auth::{Session, create_session_token, verify_session_token};
use lgtm_bookmarklet::github::GitHubUser;
use lgtm_bookmarklet::{AppState, config};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Code the mock provider exchanges for [`GOOD_TOKEN`]
pub const GOOD_CODE: &str = "good-code";
/// Token the mock API accepts
pub const GOOD_TOKEN: &str = "gho_test_token";
/// Token the mock API answers with 401
pub const REVOKED_TOKEN: &str = "gho_revoked_token";
/// Repository whose comment endpoint always fails
pub const BROKEN_REPO: &str = "broken";
/// Repository whose comment endpoint answers slower than the client timeout
pub const SLOW_REPO: &str = "slow";
/// Repository whose comment endpoint answers 201 with a non-JSON body
pub const PLAIN_TEXT_REPO: &str = "plain-text";
/// Code whose exchange answers slower than the client timeout
pub const SLOW_CODE: &str = "slow-code";

/// Upstream timeout configured for the app under test
pub const HTTP_TIMEOUT_SECONDS: u64 = 1;
/// Delay of the slow mock routes
const SLOW_RESPONSE: Duration = Duration::from_secs(HTTP_TIMEOUT_SECONDS + 2);

static METRICS: Once = Once::new();

/// Comment received by the mock API
#[derive(Debug, Clone)]
pub struct RecordedComment {
    pub path: String,
    pub body: String,
    pub authorization: Option<String>,
}

/// Mock GitHub (OAuth provider + REST API)
#[derive(Clone, Default)]
pub struct MockGitHub {
    pub token_requests: Arc<AtomicUsize>,
    pub user_requests: Arc<AtomicUsize>,
    pub comments: Arc<Mutex<Vec<RecordedComment>>>,
}

impl MockGitHub {
    pub fn token_request_count(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub fn user_request_count(&self) -> usize {
        self.user_requests.load(Ordering::SeqCst)
    }

    pub fn recorded_comments(&self) -> Vec<RecordedComment> {
        self.comments.lock().unwrap().clone()
    }

    fn router(self) -> Router {
        Router::new()
            .route("/login/oauth/access_token", post(mock_access_token))
            .route("/user", get(mock_user))
            .route(
                "/repos/:owner/:repo/issues/:number/comments",
                post(mock_create_comment),
            )
            .with_state(self)
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
}

fn is_good_token(authorization: Option<&str>) -> bool {
    authorization == Some(format!("Bearer {GOOD_TOKEN}").as_str())
}

fn bad_credentials() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Bad credentials" })),
    )
        .into_response()
}

async fn mock_access_token(State(mock): State<MockGitHub>, Json(body): Json<Value>) -> Json<Value> {
    mock.token_requests.fetch_add(1, Ordering::SeqCst);

    if body["code"] == SLOW_CODE {
        tokio::time::sleep(SLOW_RESPONSE).await;
    }

    if body["code"] == GOOD_CODE && body["client_id"] == "test-client-id" {
        Json(json!({
            "access_token": GOOD_TOKEN,
            "token_type": "bearer",
            "scope": "repo,user"
        }))
    } else {
        Json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        }))
    }
}

async fn mock_user(State(mock): State<MockGitHub>, headers: HeaderMap) -> Response {
    mock.user_requests.fetch_add(1, Ordering::SeqCst);

    if !is_good_token(bearer(&headers).as_deref()) {
        return bad_credentials();
    }

    Json(json!({
        "login": "octocat",
        "id": 583231,
        "avatar_url": "https://avatars.githubusercontent.com/u/583231",
        "name": "The Octocat"
    }))
    .into_response()
}

async fn mock_create_comment(
    State(mock): State<MockGitHub>,
    Path((owner, repo, number)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let authorization = bearer(&headers);
    mock.comments.lock().unwrap().push(RecordedComment {
        path: format!("/repos/{owner}/{repo}/issues/{number}/comments"),
        body: body["body"].as_str().unwrap_or_default().to_string(),
        authorization: authorization.clone(),
    });

    if !is_good_token(authorization.as_deref()) {
        return bad_credentials();
    }

    if repo == SLOW_REPO {
        tokio::time::sleep(SLOW_RESPONSE).await;
    }

    if repo == PLAIN_TEXT_REPO {
        return (StatusCode::CREATED, "comment created").into_response();
    }

    if repo == BROKEN_REPO {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": "Validation Failed" })),
        )
            .into_response();
    }

    (
        StatusCode::CREATED,
        Json(json!({
            "id": 1,
            "html_url": format!("https://github.com/{owner}/{repo}/issues/{number}#issuecomment-1"),
            "body": body["body"],
        })),
    )
        .into_response()
}

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub github: MockGitHub,
    pub github_addr: String,
    pub _assets_dir: TempDir,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server backed by a mock GitHub
    pub async fn new() -> Self {
        METRICS.call_once(lgtm_bookmarklet::metrics::init_metrics);

        let github = MockGitHub::default();
        let github_addr = spawn(github.clone().router()).await;

        let assets_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(assets_dir.path().join("css")).unwrap();
        std::fs::write(
            assets_dir.path().join("css/style.css"),
            "body { margin: 0; }",
        )
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                public_url: Some(addr.clone()),
                assets_dir: assets_dir.path().to_path_buf(),
            },
            session: config::SessionConfig {
                app_key: "test-secret-key-32-bytes-long!!!".to_string(),
                max_age_seconds: 3_600,
                cookie_name: "lgtm_session".to_string(),
            },
            github: config::GitHubConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                scope: "user repo".to_string(),
                authorize_url: format!("{github_addr}/login/oauth/authorize"),
                token_url: format!("{github_addr}/login/oauth/access_token"),
                api_base_url: github_addr.clone(),
            },
            http: config::HttpClientConfig {
                timeout_seconds: HTTP_TIMEOUT_SECONDS,
                connect_timeout_seconds: 5,
                user_agent: "lgtm-bookmarklet-tests".to_string(),
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(config).unwrap();
        let app = lgtm_bookmarklet::build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            addr,
            state,
            github,
            github_addr,
            _assets_dir: assets_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// `Cookie` header value carrying `session`
    pub fn cookie_for(&self, session: &Session) -> String {
        let token = create_session_token(session, &self.state.config.session.app_key)
            .expect("session can be signed");
        format!("lgtm_session={token}")
    }

    /// Session holding a valid token, without a cached user
    pub fn signed_in_session(&self) -> Session {
        let mut session = Session::new(3_600);
        session.oauth_token = Some(GOOD_TOKEN.to_string());
        session
    }

    /// Session holding a valid token and a cached user
    pub fn cached_user_session(&self) -> Session {
        let mut session = self.signed_in_session();
        session.github_login_user = Some(GitHubUser {
            login: "octocat".to_string(),
            id: 583231,
            avatar_url: None,
            name: None,
            html_url: None,
        });
        session
    }

    /// Decode the session cookie set by `response`, if any
    pub fn session_from(&self, response: &reqwest::Response) -> Option<Session> {
        let token = set_cookie_value(response, "lgtm_session")?;
        verify_session_token(&token, &self.state.config.session.app_key).ok()
    }

    /// `Cookie` header value re-sending the session set by `response`
    pub fn cookie_from(&self, response: &reqwest::Response) -> Option<String> {
        set_cookie_value(response, "lgtm_session").map(|token| format!("lgtm_session={token}"))
    }

    /// POST /lgtm with form fields
    pub async fn post_lgtm(&self, cookie: &str, fields: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url("/lgtm"))
            .header("Cookie", cookie)
            .form(fields)
            .send()
            .await
            .expect("request succeeds")
    }
}

/// Value of cookie `name` from the response's Set-Cookie headers
pub fn set_cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .find_map(|value| {
            let raw = value.to_str().ok()?;
            let pair = raw.split(';').next()?;
            let (cookie_name, cookie_value) = pair.split_once('=')?;
            (cookie_name == name).then(|| cookie_value.to_string())
        })
}

/// Location header of a redirect response
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .expect("location header")
        .to_string()
}
