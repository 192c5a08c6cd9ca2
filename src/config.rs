//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (LGTM__*)
//! 4. Deployment variables (PORT, APP_KEY, GITHUB_CLIENT_ID, GITHUB_CLIENT_SECRET)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Placeholder session key shipped as the default.
///
/// Any real deployment must override it with `APP_KEY`.
pub const DEFAULT_APP_KEY: &str = "im a secret";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub github: GitHubConfig,
    pub http: HttpClientConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (default: 3000)
    pub port: u16,
    /// Public URL used to build the OAuth callback
    /// (e.g., "https://lgtm.example.com"). Defaults to localhost.
    pub public_url: Option<String>,
    /// Directory served as static assets
    pub assets_dir: PathBuf,
}

impl ServerConfig {
    /// Get the public base URL without a trailing slash
    pub fn base_url(&self) -> String {
        match &self.public_url {
            Some(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
            _ => format!("http://localhost:{}", self.port),
        }
    }
}

/// Signed cookie session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Secret used to sign the session cookie (APP_KEY)
    pub app_key: String,
    /// Session lifetime in seconds
    pub max_age_seconds: i64,
    /// Name of the session cookie
    pub cookie_name: String,
}

/// GitHub OAuth application and API endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    pub client_id: String,
    pub client_secret: String,
    /// OAuth scope requested during authorization
    pub scope: String,
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpClientConfig {
    /// Total timeout for upstream calls
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub user_agent: String,
}

impl HttpClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> String {
        format!("lgtm_bookmarklet={},tower_http=debug", self.level)
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.assets_dir", "assets")?
            .set_default("session.app_key", DEFAULT_APP_KEY)?
            .set_default("session.max_age_seconds", 1_209_600)?
            .set_default("session.cookie_name", "lgtm_session")?
            .set_default("github.client_id", "")?
            .set_default("github.client_secret", "")?
            .set_default("github.scope", "user repo")?
            .set_default(
                "github.authorize_url",
                "https://github.com/login/oauth/authorize",
            )?
            .set_default(
                "github.token_url",
                "https://github.com/login/oauth/access_token",
            )?
            .set_default("github.api_base_url", "https://api.github.com")?
            .set_default("http.timeout_seconds", 10)?
            .set_default("http.connect_timeout_seconds", 5)?
            .set_default(
                "http.user_agent",
                concat!("lgtm-bookmarklet/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("LGTM")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .set_override_option("session.app_key", std::env::var("APP_KEY").ok())?
            .set_override_option("github.client_id", std::env::var("GITHUB_CLIENT_ID").ok())?
            .set_override_option(
                "github.client_secret",
                std::env::var("GITHUB_CLIENT_SECRET").ok(),
            )?
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.base_url().starts_with("https://")
    }

    /// Absolute URL GitHub redirects back to after authorization
    pub fn oauth_callback_url(&self) -> String {
        format!("{}/auth/github/callback", self.server.base_url())
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.session.app_key.is_empty() {
            return Err(crate::error::AppError::Config(
                "session.app_key must not be empty".to_string(),
            ));
        }

        if self.session.max_age_seconds <= 0 {
            return Err(crate::error::AppError::Config(
                "session.max_age_seconds must be greater than 0".to_string(),
            ));
        }

        if self.http.timeout_seconds == 0 || self.http.connect_timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "http timeouts must be greater than 0".to_string(),
            ));
        }

        url::Url::parse(&self.server.base_url()).map_err(|e| {
            crate::error::AppError::Config(format!("server.public_url is invalid: {e}"))
        })?;

        Ok(())
    }

    /// Log settings that load fine but will not work in production
    pub fn warn_on_placeholders(&self) {
        if self.session.app_key == DEFAULT_APP_KEY {
            tracing::warn!("APP_KEY is not set; sessions are signed with the placeholder key");
        }
        if self.github.client_id.is_empty() {
            tracing::warn!("github.client_id is empty; OAuth authorization will fail");
        }
    }
}
