//! Slack request signature verification
//!
//! Slack signs every webhook with HMAC-SHA256 over `v0:{timestamp}:{body}`
//! keyed with the app's signing secret and sends `v0={hex}` in
//! `X-Slack-Signature`.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_VERSION: &str = "v0";

/// Requests whose timestamp is further than this from now are refused.
pub const MAX_TIMESTAMP_SKEW_SECS: i64 = 60 * 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("timestamp is not a unix epoch integer: {0}")]
    MalformedTimestamp(String),
    #[error("timestamp {timestamp} is too far from current time {now}")]
    StaleTimestamp { timestamp: i64, now: i64 },
    #[error("signature is not of the form v0=<hex>")]
    MalformedSignature,
    #[error("signature mismatch")]
    Mismatch,
    #[error("failed to serialize body: {0}")]
    Body(String),
}

/// The body a signature is checked against
pub enum SignedBody<'a> {
    /// Exact bytes received on the wire
    Raw(&'a [u8]),
    /// Already decoded JSON; re-serialized with [`canonical_json_body`]
    Json(&'a Value),
}

/// Re-serializes a decoded payload the way Slack serialized it.
///
/// Slack escapes forward slashes as `\/`. Decoding drops the escape, so it is
/// put back before hashing.
pub fn canonical_json_body(value: &Value) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(value)?.replace('/', "\\/"))
}

#[derive(Clone)]
pub struct SignatureVerifier {
    signing_secret: String,
}

impl SignatureVerifier {
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
        }
    }

    pub fn verify(
        &self,
        timestamp: &str,
        signature: &str,
        body: SignedBody<'_>,
    ) -> Result<(), SignatureError> {
        self.verify_at(chrono::Utc::now().timestamp(), timestamp, signature, body)
    }

    /// Same as [`SignatureVerifier::verify`] with an explicit current time.
    pub fn verify_at(
        &self,
        now: i64,
        timestamp: &str,
        signature: &str,
        body: SignedBody<'_>,
    ) -> Result<(), SignatureError> {
        let ts = timestamp
            .trim()
            .parse::<i64>()
            .map_err(|_| SignatureError::MalformedTimestamp(timestamp.to_string()))?;
        if now.abs_diff(ts) > MAX_TIMESTAMP_SKEW_SECS.unsigned_abs() {
            return Err(SignatureError::StaleTimestamp { timestamp: ts, now });
        }

        let expected = signature
            .strip_prefix(SIGNATURE_VERSION)
            .and_then(|s| s.strip_prefix('='))
            .and_then(|hex_sig| hex::decode(hex_sig).ok())
            .ok_or(SignatureError::MalformedSignature)?;

        let canonical;
        let body = match body {
            SignedBody::Raw(bytes) => bytes,
            SignedBody::Json(value) => {
                canonical =
                    canonical_json_body(value).map_err(|e| SignatureError::Body(e.to_string()))?;
                canonical.as_bytes()
            }
        };

        self.mac(timestamp, body)
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }

    /// Computes the `v0=<hex>` signature for a body.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> String {
        let digest = self.mac(timestamp, body).finalize().into_bytes();
        format!("{SIGNATURE_VERSION}={}", hex::encode(digest))
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.signing_secret.as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        mac
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use serde_json::json;

        const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
        const NOW: i64 = 1_531_420_618;

        fn verifier() -> SignatureVerifier {
            SignatureVerifier::new(SECRET)
        }

        #[test]
        fn test_slack_documented_example() {
            // https://api.slack.com/authentication/verifying-requests-from-slack
            let body = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";
            let signature = "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503";

            assert_eq!(verifier().sign("1531420618", body), signature);
            assert_eq!(
                verifier().verify_at(NOW, "1531420618", signature, SignedBody::Raw(body)),
                Ok(())
            );
        }

        #[test]
        fn test_mutated_body_fails() {
            let body = br#"{"type":"event_callback","event":{"text":"hello"}}"#;
            let signature = verifier().sign("1531420618", body);

            let mut mutated = body.to_vec();
            mutated[30] ^= 0x01;
            assert_eq!(
                verifier().verify_at(NOW, "1531420618", &signature, SignedBody::Raw(&mutated)),
                Err(SignatureError::Mismatch)
            );
        }

        #[test]
        fn test_wrong_secret_fails() {
            let body = b"{}";
            let signature = SignatureVerifier::new("other-secret").sign("1531420618", body);
            assert_eq!(
                verifier().verify_at(NOW, "1531420618", &signature, SignedBody::Raw(body)),
                Err(SignatureError::Mismatch)
            );
        }

        #[test]
        fn test_stale_timestamp_fails() {
            let body = b"{}";
            let old = (NOW - 600).to_string();
            let signature = verifier().sign(&old, body);
            assert_eq!(
                verifier().verify_at(NOW, &old, &signature, SignedBody::Raw(body)),
                Err(SignatureError::StaleTimestamp {
                    timestamp: NOW - 600,
                    now: NOW
                })
            );
        }

        #[test]
        fn test_future_timestamp_fails() {
            let body = b"{}";
            let future = (NOW + 600).to_string();
            let signature = verifier().sign(&future, body);
            assert!(matches!(
                verifier().verify_at(NOW, &future, &signature, SignedBody::Raw(body)),
                Err(SignatureError::StaleTimestamp { .. })
            ));
        }

        #[test]
        fn test_extreme_timestamps_are_stale() {
            for ts in [i64::MIN, i64::MAX] {
                assert_eq!(
                    verifier().verify_at(NOW, &ts.to_string(), "v0=00", SignedBody::Raw(b"{}")),
                    Err(SignatureError::StaleTimestamp { timestamp: ts, now: NOW })
                );
            }
        }

        #[test]
        fn test_timestamp_within_window_succeeds() {
            let body = b"{}";
            let recent = (NOW - 120).to_string();
            let signature = verifier().sign(&recent, body);
            assert!(
                verifier()
                    .verify_at(NOW, &recent, &signature, SignedBody::Raw(body))
                    .is_ok()
            );
        }

        #[test]
        fn test_non_numeric_timestamp_fails() {
            assert_eq!(
                verifier().verify_at(NOW, "yesterday", "v0=00", SignedBody::Raw(b"{}")),
                Err(SignatureError::MalformedTimestamp("yesterday".to_string()))
            );
        }

        #[test]
        fn test_signature_without_version_prefix_fails() {
            let body = b"{}";
            let signature = verifier().sign("1531420618", body);
            let bare = signature.trim_start_matches("v0=");
            assert_eq!(
                verifier().verify_at(NOW, "1531420618", bare, SignedBody::Raw(body)),
                Err(SignatureError::MalformedSignature)
            );
            assert_eq!(
                verifier().verify_at(NOW, "1531420618", "v0=zz", SignedBody::Raw(body)),
                Err(SignatureError::MalformedSignature)
            );
        }

        #[test]
        fn test_decoded_json_is_re_escaped() {
            // What Slack put on the wire: forward slashes escaped.
            let wire = r#"{"type":"event_callback","event":{"text":"see https:\/\/example.com\/a"}}"#;
            let signature = verifier().sign("1531420618", wire.as_bytes());

            let decoded: Value = serde_json::from_str(wire).unwrap();
            assert_eq!(
                decoded["event"]["text"],
                json!("see https://example.com/a")
            );
            assert_eq!(canonical_json_body(&decoded).unwrap(), wire);
            assert_eq!(
                verifier().verify_at(NOW, "1531420618", &signature, SignedBody::Json(&decoded)),
                Ok(())
            );
        }

        #[test]
        fn test_decoded_json_without_re_escape_would_not_match() {
            let wire = r#"{"url":"a\/b"}"#;
            let signature = verifier().sign("1531420618", wire.as_bytes());
            let unescaped = serde_json::to_string(&serde_json::from_str::<Value>(wire).unwrap())
                .unwrap();
            assert_eq!(
                verifier().verify_at(
                    NOW,
                    "1531420618",
                    &signature,
                    SignedBody::Raw(unescaped.as_bytes())
                ),
                Err(SignatureError::Mismatch)
            );
        }
    }
}
