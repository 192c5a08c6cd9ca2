//! LGTM bookmarklet - post LGTM comments to GitHub from a bookmarklet
//!
//! # Request flow
//!
//! ```text
//! browser ─▶ auth gate ─▶ CSRF check ─▶ validation ─▶ GitHub API ─▶ render
//!              │ no token
//!              └──▶ GitHub OAuth ─▶ /auth/github/callback ─▶ original URL
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers (index, LGTM form/submission, assets, metrics)
//! - `auth`: GitHub OAuth, signed cookie session, auth gate
//! - `csrf`: Per-form CSRF tokens
//! - `github`: GitHub REST API facade
//! - `render`: View rendering
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod csrf;
pub mod error;
pub mod github;
pub mod metrics;
pub mod render;

use std::sync::Arc;

use axum::response::Html;

/// Application state shared across all handlers
///
/// Holds no per-user data: GitHub clients are built per request from
/// the session's token.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// HTTP client for GitHub (OAuth and REST)
    pub http_client: Arc<reqwest::Client>,

    /// View renderer
    pub renderer: Arc<dyn render::Render>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let http_client = reqwest::Client::builder()
            .user_agent(config.http.user_agent.clone())
            .connect_timeout(config.http.connect_timeout())
            .timeout(config.http.timeout())
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        Ok(Self {
            config: Arc::new(config),
            http_client: Arc::new(http_client),
            renderer: Arc::new(render::HtmlRenderer),
        })
    }

    /// Replace the view renderer
    pub fn with_renderer(mut self, renderer: Arc<dyn render::Render>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Render a view, adding the shared page title
    pub fn render(
        &self,
        view: &str,
        mut locals: render::Locals,
    ) -> Result<Html<String>, error::AppError> {
        locals.insert("title".into(), render::TITLE.into());
        self.renderer.render(view, &locals).map(Html)
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let assets = api::assets_service(&state.config.server.assets_dir);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .merge(api::home_router())
        .merge(api::lgtm_router(state.clone()))
        .fallback_service(assets)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
