//! Webhook signature verification.
//!
//! The provider signs each delivery with HMAC-SHA256 over
//! `"{timestamp}.{raw body}"` and sends `t=<unix>,v1=<hex digest>` in the
//! signature header. Verification happens on the raw body before any JSON
//! is parsed; the timestamp is bounded to a tolerance window so captured
//! deliveries cannot be replayed indefinitely.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature
pub const SIGNATURE_HEADER: &str = "x-provider-signature";

/// Maximum accepted age (and clock skew) of a signed delivery, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Reasons a delivery's signature is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is missing")]
    MissingHeader,

    #[error("signature header is malformed")]
    Malformed,

    #[error("signed timestamp is outside the tolerance window")]
    StaleTimestamp,

    #[error("signature does not match payload")]
    Mismatch,
}

/// Compute the signature value for a payload, as the provider would.
/// Used by tests and local tooling to produce valid deliveries.
pub fn sign(secret: &[u8], timestamp: i64, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("hmac accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

/// Verify a signature header against the raw request body.
///
/// `now` is the verifier's clock; deliveries signed more than
/// `tolerance_secs` away from it (either direction) are rejected before the
/// MAC is checked. The MAC comparison itself is constant-time.
pub fn verify(
    secret: &[u8],
    header: &str,
    payload: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let (timestamp, signature_hex) = parse_header(header)?;

    if (now - timestamp).abs() > tolerance_secs {
        return Err(SignatureError::StaleTimestamp);
    }

    let signature = hex::decode(signature_hex).map_err(|_| SignatureError::Malformed)?;

    let mut mac =
        HmacSha256::new_from_slice(secret).expect("hmac accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.verify_slice(&signature)
        .map_err(|_| SignatureError::Mismatch)
}

fn parse_header(header: &str) -> Result<(i64, &str), SignatureError> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => signature = Some(v),
            _ => {}
        }
    }

    match (timestamp, signature) {
        (Some(t), Some(s)) => Ok((t, s)),
        _ => Err(SignatureError::Malformed),
    }
}
