//! API layer
//!
//! HTTP handlers for:
//! - Landing page with the bookmarklet
//! - LGTM comment form and submission
//! - Static assets
//! - Metrics (Prometheus)

mod home;
mod lgtm;
pub mod metrics;

pub use home::{bookmarklet_code, home_router};
pub use lgtm::{LgtmRequest, lgtm_markdown, lgtm_router};
pub use metrics::metrics_router;

use std::path::Path;

use axum::http::{HeaderValue, header::CACHE_CONTROL};
use tower_http::{services::ServeDir, set_header::SetResponseHeader};

/// Static assets cached by browsers for 30 days
const ASSET_CACHE_CONTROL: &str = "public, max-age=2592000";

/// Service serving files under `dir`
pub fn assets_service(dir: &Path) -> SetResponseHeader<ServeDir, HeaderValue> {
    SetResponseHeader::if_not_present(
        ServeDir::new(dir),
        CACHE_CONTROL,
        HeaderValue::from_static(ASSET_CACHE_CONTROL),
    )
}
