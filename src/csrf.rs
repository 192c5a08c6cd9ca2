//! CSRF protection for form submissions
//!
//! Tokens have the form `nonce.hmac_sha256(csrf_secret, nonce)`: a fresh
//! nonce per rendered form, bound to the session's secret. Verification
//! recomputes the MAC and compares it in constant time.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::auth::Session;
use crate::error::AppError;

/// Form field carrying the token
pub const CSRF_FIELD: &str = "_csrf";

type HmacSha256 = Hmac<Sha256>;

fn random_b64(len: usize) -> String {
    let mut bytes = vec![0_u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a per-session CSRF secret
pub fn generate_secret() -> String {
    random_b64(32)
}

fn token_mac(secret: &str, nonce: &str) -> Result<HmacSha256, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(nonce.as_bytes());
    Ok(mac)
}

/// Derive the token for one form from the session secret and a fresh nonce
pub fn issue_token(session: &Session) -> Result<String, AppError> {
    issue_token_with_nonce(session, &random_b64(16))
}

fn issue_token_with_nonce(session: &Session, nonce: &str) -> Result<String, AppError> {
    let signature = token_mac(&session.csrf_secret, nonce)?
        .finalize()
        .into_bytes();
    Ok(format!("{}.{}", nonce, URL_SAFE_NO_PAD.encode(signature)))
}

/// Verify a submitted token against the session secret
///
/// # Errors
/// `AppError::Csrf` when the token is missing, malformed or forged
pub fn verify(session: &Session, submitted: Option<&str>) -> Result<(), AppError> {
    let submitted = submitted
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Csrf)?;
    let (nonce, signature_b64) = submitted.split_once('.').ok_or(AppError::Csrf)?;
    if nonce.is_empty() {
        return Err(AppError::Csrf);
    }
    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Csrf)?;

    token_mac(&session.csrf_secret, nonce)?
        .verify_slice(&signature)
        .map_err(|_| AppError::Csrf)
}
