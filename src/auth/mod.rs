//! GitHub OAuth authentication
//!
//! Handles:
//! - GitHub OAuth flow
//! - Signed cookie sessions
//! - Authentication gate

mod middleware;
mod oauth;
pub mod session;

pub use middleware::{AuthorizationContext, require_auth};
pub use oauth::auth_router;
pub use session::{Session, create_session_token, save_session, verify_session_token};
