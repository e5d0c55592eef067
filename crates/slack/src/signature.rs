//! Slack request signing (`v0` scheme).
//!
//! Slack signs `v0:{timestamp}:{raw body}` with the app's signing secret
//! using HMAC-SHA256 and sends the hex digest in `X-Slack-Signature`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_VERSION: &str = "v0";
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing request timestamp header")]
    MissingTimestamp,
    #[error("missing request signature header")]
    MissingSignature,
    #[error("request timestamp `{0}` is not a unix timestamp")]
    InvalidTimestamp(String),
    #[error("request timestamp is {skew_secs}s away from server time")]
    Stale { skew_secs: i64 },
    #[error("signing secret is not usable as an hmac key")]
    InvalidKey,
    #[error("request signature does not match")]
    Mismatch,
}

pub struct RequestVerifier {
    signing_secret: SecretString,
}

impl RequestVerifier {
    pub fn new(signing_secret: SecretString) -> Self {
        Self { signing_secret }
    }

    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?.trim();
        let signature = signature.ok_or(SignatureError::MissingSignature)?.trim();

        let issued_at = timestamp
            .parse::<i64>()
            .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_owned()))?;
        let skew_secs = (now.timestamp() - issued_at).abs();
        if skew_secs > TIMESTAMP_TOLERANCE_SECS {
            return Err(SignatureError::Stale { skew_secs });
        }

        let digest = signature
            .strip_prefix("v0=")
            .and_then(|hex_digest| hex::decode(hex_digest).ok())
            .ok_or(SignatureError::Mismatch)?;

        let mac = signing_mac(self.signing_secret.expose_secret(), timestamp, body)?;
        mac.verify_slice(&digest).map_err(|_| SignatureError::Mismatch)
    }
}

/// Computes the `X-Slack-Signature` header value for a body.
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mac = signing_mac(signing_secret, timestamp, body)?;
    Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(mac.finalize().into_bytes())))
}

fn signing_mac(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .map_err(|_| SignatureError::InvalidKey)?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{sign, RequestVerifier, SignatureError};

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const BODY: &[u8] = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&command=%2Fstart";

    fn verifier() -> RequestVerifier {
        RequestVerifier::new(SECRET.to_owned().into())
    }

    #[test]
    fn accepts_signature_computed_over_raw_body() {
        let now = Utc.timestamp_opt(1_531_420_618, 0).single().expect("timestamp");
        let signature = sign(SECRET, "1531420618", BODY).expect("sign");

        assert!(signature.starts_with("v0="));
        assert_eq!(verifier().verify(Some("1531420618"), Some(&signature), BODY, now), Ok(()));
    }

    #[test]
    fn rejects_tampered_body() {
        let now = Utc.timestamp_opt(1_531_420_618, 0).single().expect("timestamp");
        let signature = sign(SECRET, "1531420618", BODY).expect("sign");

        assert_eq!(
            verifier().verify(Some("1531420618"), Some(&signature), b"command=%2Fother", now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_timestamp() {
        let now = Utc.timestamp_opt(1_531_420_618 + 301, 0).single().expect("timestamp");
        let signature = sign(SECRET, "1531420618", BODY).expect("sign");

        assert_eq!(
            verifier().verify(Some("1531420618"), Some(&signature), BODY, now),
            Err(SignatureError::Stale { skew_secs: 301 })
        );
    }

    #[test]
    fn rejects_missing_headers_and_malformed_values() {
        let now = Utc.timestamp_opt(1_531_420_618, 0).single().expect("timestamp");

        assert_eq!(
            verifier().verify(None, Some("v0=00"), BODY, now),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verifier().verify(Some("1531420618"), None, BODY, now),
            Err(SignatureError::MissingSignature)
        );
        assert_eq!(
            verifier().verify(Some("yesterday"), Some("v0=00"), BODY, now),
            Err(SignatureError::InvalidTimestamp("yesterday".to_owned()))
        );
        assert_eq!(
            verifier().verify(Some("1531420618"), Some("v1=zz"), BODY, now),
            Err(SignatureError::Mismatch)
        );
    }
}
