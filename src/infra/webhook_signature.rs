//! Payment provider webhook signatures: HMAC-SHA256 over the raw body.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::app_error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 digest of a payload. Tests use this to build valid
/// signature headers for synthetic deliveries.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a signature header against the exact raw request bytes.
///
/// Must run on the bytes as received: parsing and re-serializing the JSON
/// does not round-trip byte-for-byte and would invalidate the digest.
pub fn verify_signature(
    secret: &SecretString,
    body: &[u8],
    signature_header: &str,
) -> AppResult<()> {
    let expected = sign_payload(secret.expose_secret(), body);
    if constant_time_compare(signature_header.trim(), &expected) {
        Ok(())
    } else {
        Err(AppError::InvalidSignature)
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
