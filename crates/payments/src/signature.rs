//! HMAC-SHA256 signing and verification for gateway signatures.
//!
//! Razorpay signs the verify callback over `"{order_ref}|{payment_ref}"`
//! with the key secret, and webhook deliveries over the raw request body
//! with the webhook secret, hex-encoding both.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex-encoded HMAC-SHA256 of `message` under `secret`.
pub fn sign(secret: &str, message: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a hex-encoded signature against `message` in constant time.
///
/// Returns false for malformed hex rather than erroring; a garbled
/// signature is just an invalid one.
pub fn verify(secret: &str, message: &[u8], signature_hex: &str) -> bool {
    let Ok(claimed) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message);
    mac.verify_slice(&claimed).is_ok()
}
