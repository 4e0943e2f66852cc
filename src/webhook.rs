//! Signed-webhook verification.
//!
//! Webhook deliveries carry an HMAC-SHA256 signature of the payload, keyed
//! with the endpoint's shared secret. When a timestamp header is present the
//! MAC covers `"{timestamp}.{body}"`, binding the signature to a point in
//! time; otherwise it covers the body alone.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{FinlightError, FinlightResult};

type HmacSha256 = Hmac<Sha256>;

/// Optional prefix on the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Maximum tolerated clock skew for timestamped signatures.
const MAX_TIMESTAMP_SKEW_SECS: i64 = 300;

/// Verify a webhook delivery.
///
/// `signature` is the hex digest from the signature header, with or without
/// the `sha256=` prefix. `timestamp` is the unix-seconds value from the
/// timestamp header when the sender included one.
///
/// The digest comparison is length-checked and constant-time.
///
/// # Errors
///
/// Returns [`FinlightError::Signature`] when the signature is not valid hex,
/// the timestamp is malformed or outside the ±5 minute window, or the digest
/// does not match.
pub fn verify_webhook_signature(
    body: &[u8],
    signature: &str,
    secret: &str,
    timestamp: Option<&str>,
) -> FinlightResult<()> {
    let hex_digest = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);
    let expected = hex::decode(hex_digest)
        .map_err(|_| FinlightError::signature("signature is not valid hex"))?;

    if let Some(ts) = timestamp {
        let ts: i64 = ts
            .trim()
            .parse()
            .map_err(|_| FinlightError::signature("timestamp is not a unix-seconds value"))?;
        let skew = (Utc::now().timestamp() - ts).abs();
        if skew > MAX_TIMESTAMP_SKEW_SECS {
            return Err(FinlightError::signature(format!(
                "timestamp outside tolerance ({skew}s skew)"
            )));
        }
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| FinlightError::signature("invalid secret"))?;
    if let Some(ts) = timestamp {
        mac.update(ts.trim().as_bytes());
        mac.update(b".");
    }
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| FinlightError::signature("digest mismatch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_without_timestamp() {
        let body = br#"{"event":"article.published"}"#;
        let sig = sign("secret", body);
        assert!(verify_webhook_signature(body, &sig, "secret", None).is_ok());
    }

    #[test]
    fn test_prefix_is_accepted() {
        let body = b"payload";
        let sig = format!("sha256={}", sign("secret", body));
        assert!(verify_webhook_signature(body, &sig, "secret", None).is_ok());
    }

    #[test]
    fn test_timestamp_is_bound_into_mac() {
        let body = b"payload";
        let ts = Utc::now().timestamp().to_string();
        let sig = sign("secret", format!("{ts}.payload").as_bytes());
        assert!(verify_webhook_signature(body, &sig, "secret", Some(&ts)).is_ok());

        // Same signature without the timestamp must fail.
        assert!(verify_webhook_signature(body, &sig, "secret", None).is_err());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let body = b"payload";
        let sig = sign("secret", body);
        let err = verify_webhook_signature(b"payload2", &sig, "secret", None).unwrap_err();
        assert!(matches!(err, FinlightError::Signature { .. }));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"payload";
        let sig = sign("secret", body);
        assert!(verify_webhook_signature(body, &sig, "other", None).is_err());
    }

    #[test]
    fn test_truncated_digest_rejected() {
        let body = b"payload";
        let sig = sign("secret", body);
        // Valid hex of the wrong length fails the length check.
        assert!(verify_webhook_signature(body, &sig[..16], "secret", None).is_err());
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        let err = verify_webhook_signature(b"payload", "zzzz", "secret", None).unwrap_err();
        assert!(matches!(err, FinlightError::Signature { .. }));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let body = b"payload";
        let ts = (Utc::now().timestamp() - 600).to_string();
        let sig = sign("secret", format!("{ts}.payload").as_bytes());
        assert!(verify_webhook_signature(body, &sig, "secret", Some(&ts)).is_err());
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let body = b"payload";
        let ts = (Utc::now().timestamp() + 600).to_string();
        let sig = sign("secret", format!("{ts}.payload").as_bytes());
        assert!(verify_webhook_signature(body, &sig, "secret", Some(&ts)).is_err());
    }

    #[test]
    fn test_malformed_timestamp_rejected() {
        let body = b"payload";
        let sig = sign("secret", body);
        assert!(verify_webhook_signature(body, &sig, "secret", Some("not-a-number")).is_err());
    }
}
