//! Webhook verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Verify the `X-Hub-Signature-256` header of a webhook delivery.
///
/// The header has the form `sha256=<hex>`, the HMAC-SHA256 of the raw body
/// keyed with the app secret. Comparison is constant-time.
pub fn verify_signature(body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let expected = match signature_header.trim().strip_prefix("sha256=") {
        Some(hex) => hex,
        None => {
            warn!("invalid signature header format (missing sha256= prefix)");
            return false;
        }
    };

    let expected = match hex::decode(expected) {
        Ok(bytes) => bytes,
        Err(_) => {
            warn!("invalid signature header format (not hex)");
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("failed to create HMAC");
            return false;
        }
    };

    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Answer the subscription handshake.
///
/// Returns the challenge to echo back when `mode` is `subscribe` and the
/// token matches; `None` means the request must be refused.
pub fn verify_subscription<'a>(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&'a str>,
    verify_token: &str,
) -> Option<&'a str> {
    if verify_token.is_empty() {
        return None;
    }
    match (mode, token, challenge) {
        (Some("subscribe"), Some(token), Some(challenge)) if token == verify_token => {
            Some(challenge)
        }
        _ => None,
    }
}
