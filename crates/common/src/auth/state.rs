//! Anti-CSRF state nonce for the OAuth authorization redirect
//!
//! The state value is round-tripped through the browser redirect and must
//! come back unchanged on the callback. It protects against forged
//! callbacks, not eavesdropping, so a constant-content comparison is
//! sufficient.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;

/// Generate a random state token for CSRF protection
///
/// Returns a URL-safe base64-encoded random string of 32 bytes (43 characters).
#[must_use]
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Validate that the callback state matches the issued nonce
///
/// # Arguments
/// * `expected` - The state that was issued with the authorization URL
/// * `actual` - The state received in the callback
///
/// # Returns
/// `true` if states match, `false` otherwise
#[must_use]
pub fn validate_state(expected: &str, actual: &str) -> bool {
    expected == actual
}
