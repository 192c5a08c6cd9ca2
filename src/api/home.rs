//! Landing page with the bookmarklet link

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, header::HOST},
    response::Html,
    routing::get,
};
use serde_json::json;

use crate::AppState;
use crate::error::AppError;
use crate::render::Locals;

const BOOKMARKLET_SOURCE: &str = include_str!("../../assets/src/bookmarklet.js");

/// Create home router
///
/// Routes:
/// - GET / - Index page
pub fn home_router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

/// GET /
async fn index(State(state): State<AppState>, headers: HeaderMap) -> Result<Html<String>, AppError> {
    let base_url = request_base_url(&headers, &state.config.server.base_url());

    let mut locals = Locals::new();
    locals.insert(
        "bmltCode".into(),
        json!(bookmarklet_code(BOOKMARKLET_SOURCE, &base_url)),
    );
    state.render("index", locals)
}

/// `scheme://host` the browser used to reach us
///
/// Honours `X-Forwarded-Proto` and `Host`, falling back to the configured
/// public URL.
fn request_base_url(headers: &HeaderMap, configured: &str) -> String {
    let Some(host) = header_value(headers, HOST.as_str()) else {
        return configured.to_string();
    };
    let scheme = header_value(headers, "x-forwarded-proto")
        .or_else(|| configured.split_once("://").map(|(scheme, _)| scheme))
        .unwrap_or("http");

    format!("{scheme}://{host}")
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Wrap the bookmarklet source into a `javascript:` URL pointing at `base_url`
pub fn bookmarklet_code(source: &str, base_url: &str) -> String {
    let script = source.replace("{BASE_URL}", base_url);
    format!(
        "javascript:(function(window,undefined){{{}}})(window);",
        urlencoding::encode(&script)
    )
}
