//! Webhook request signature validation
//!
//! The provider signs every webhook with HMAC-SHA1 over the full request URL
//! followed by the form parameters sorted by name, keyed by the account auth
//! token, and sends the base64 digest in the `X-Twilio-Signature` header.

use std::collections::BTreeMap;

use base64::Engine;
use ring::hmac;

/// Compute the expected signature for a webhook request.
pub fn compute_signature(auth_token: &str, url: &str, params: &BTreeMap<String, String>) -> String {
    let mut payload = url.to_string();
    for (key, value) in params {
        payload.push_str(key);
        payload.push_str(value);
    }

    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, auth_token.as_bytes());
    let digest = hmac::sign(&key, payload.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(digest.as_ref())
}

/// Check a webhook signature in constant time.
pub fn validate_signature(
    auth_token: &str,
    url: &str,
    params: &BTreeMap<String, String>,
    signature: &str,
) -> bool {
    let expected = compute_signature(auth_token, url, params);
    ring::constant_time::verify_slices_are_equal(expected.as_bytes(), signature.as_bytes()).is_ok()
}
