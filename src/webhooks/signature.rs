//! `X-Hub-Signature-256` verification.
//!
//! GitHub signs each delivery body with HMAC-SHA256 over the shared webhook
//! secret and sends the digest as `sha256=<hex>`. Deliveries are verified
//! before the body is parsed.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Decodes a `sha256=<hex>` header into the raw digest.
///
/// Returns `None` for any other shape.
///
/// ```
/// use pr_trigger_bot::webhooks::parse_signature_header;
///
/// assert_eq!(parse_signature_header("sha256=0aff"), Some(vec![0x0a, 0xff]));
/// assert!(parse_signature_header("sha1=0aff").is_none());
/// assert!(parse_signature_header("sha256=not-hex").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    hex::decode(header.strip_prefix("sha256=")?).ok()
}

/// HMAC-SHA256 of `payload` under `secret`.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Renders a digest the way GitHub sends it.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Checks a delivery's signature header against its body.
///
/// The digest comparison is constant time.
///
/// ```
/// use pr_trigger_bot::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let body = br#"{"action":"opened"}"#;
/// let header = format_signature_header(&compute_signature(body, b"hook-secret"));
///
/// assert!(verify_signature(body, &header, b"hook-secret"));
/// assert!(!verify_signature(body, &header, b"another-secret"));
/// ```
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
