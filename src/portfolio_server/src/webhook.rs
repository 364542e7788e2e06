//! Processor webhook signature check.
//!
//! The processor sends `Stripe-Signature: t=<unix secs>,v1=<hex>[,v1=<hex>...]` where each
//! `v1` is `HMAC-SHA256(secret, "<t>.<raw body>")`. Several `v1` entries appear while the
//! processor rotates secrets; any one matching is enough.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing {SIGNATURE_HEADER} header")]
    Missing,

    #[error("malformed signature header")]
    Malformed,

    #[error("timestamp outside tolerance")]
    Expired,

    #[error("no matching signature")]
    Mismatch,
}

struct Parsed {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<Parsed, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((k, v)) = part.trim().split_once('=') else {
            return Err(SignatureError::Malformed);
        };
        match k {
            "t" => timestamp = Some(v.parse().map_err(|_| SignatureError::Malformed)?),
            "v1" => signatures.push(hex::decode(v).map_err(|_| SignatureError::Malformed)?),
            // other schemes (v0) are ignored
            _ => {}
        }
    }
    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(Parsed { timestamp, signatures }),
        _ => Err(SignatureError::Malformed),
    }
}

fn mac(secret: &[u8], timestamp: i64, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

/// Check `header` against `body` at time `now` (unix seconds).
pub fn verify(
    secret: &[u8],
    header: Option<&str>,
    body: &[u8],
    now: i64,
    tolerance: Duration,
) -> Result<(), SignatureError> {
    let parsed = parse_header(header.ok_or(SignatureError::Missing)?)?;

    let age = now.abs_diff(parsed.timestamp);
    if age > tolerance.as_secs() {
        return Err(SignatureError::Expired);
    }

    // verify_slice compares in constant time
    let base = mac(secret, parsed.timestamp, body)?;
    if parsed
        .signatures
        .iter()
        .any(|sig| base.clone().verify_slice(sig).is_ok())
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Header value for `body` signed at `timestamp`. Used by tests and local tooling.
pub fn sign(secret: &[u8], timestamp: i64, body: &[u8]) -> String {
    let sig = match mac(secret, timestamp, body) {
        Ok(m) => hex::encode(m.finalize().into_bytes()),
        Err(_) => String::new(),
    };
    format!("t={timestamp},v1={sig}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"whsec_test";
    const BODY: &[u8] = br#"{"id":"evt_1"}"#;
    const TOL: Duration = Duration::from_secs(300);

    #[test]
    fn accepts_own_signature() {
        let h = sign(SECRET, 1_700_000_000, BODY);
        assert_eq!(verify(SECRET, Some(&h), BODY, 1_700_000_100, TOL), Ok(()));
    }

    #[test]
    fn any_v1_may_match() {
        let good = sign(SECRET, 1_700_000_000, BODY);
        let sig = good.split_once(",v1=").unwrap().1;
        let h = format!("t=1700000000,v1={},v1={sig}", "00".repeat(32));
        assert_eq!(verify(SECRET, Some(&h), BODY, 1_700_000_000, TOL), Ok(()));
    }

    #[test]
    fn rejects_tampering() {
        let h = sign(SECRET, 1_700_000_000, BODY);
        assert_eq!(
            verify(SECRET, Some(&h), br#"{"id":"evt_2"}"#, 1_700_000_000, TOL),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify(b"other", Some(&h), BODY, 1_700_000_000, TOL),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_and_malformed() {
        let h = sign(SECRET, 1_700_000_000, BODY);
        assert_eq!(
            verify(SECRET, Some(&h), BODY, 1_700_000_301, TOL),
            Err(SignatureError::Expired)
        );
        assert_eq!(verify(SECRET, None, BODY, 0, TOL), Err(SignatureError::Missing));
        assert_eq!(
            verify(SECRET, Some("t=abc,v1=zz"), BODY, 0, TOL),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify(SECRET, Some("t=1700000000"), BODY, 1_700_000_000, TOL),
            Err(SignatureError::Malformed)
        );
    }
}
