//! HMAC-SHA256 webhook signatures.
//!
//! Three header conventions are understood:
//!
//! - `GitHub`: `X-Hub-Signature-256: sha256=<hex>` over the raw body
//! - `Slack`: `X-Slack-Signature: v0=<hex>` over `v0:{timestamp}:{body}`,
//!   with `X-Slack-Request-Timestamp` checked against a tolerance window
//! - `Hex`: `X-Signature: <hex>` over the raw body
//!
//! Comparison goes through `Mac::verify_slice`, which is constant time.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;

use crate::integrations::error::IntegrationError;

type HmacSha256 = Hmac<Sha256>;

pub const GITHUB_SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const SLACK_SIGNATURE_HEADER: &str = "x-slack-signature";
pub const SLACK_TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const HEX_SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScheme {
    GitHub,
    Slack,
    Hex,
}

impl SignatureScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureScheme::GitHub => "github",
            SignatureScheme::Slack => "slack",
            SignatureScheme::Hex => "hex",
        }
    }

    /// Check the signature headers of a request against its raw body
    pub fn verify(
        &self,
        secret: &[u8],
        headers: &HeaderMap,
        body: &[u8],
        now: i64,
        tolerance_secs: i64,
    ) -> Result<(), IntegrationError> {
        match self {
            SignatureScheme::GitHub => {
                let value = header(headers, GITHUB_SIGNATURE_HEADER)?;
                let hex_sig = value
                    .strip_prefix("sha256=")
                    .ok_or_else(|| IntegrationError::MalformedSignature("expected sha256= prefix".into()))?;
                verify_hex(secret, body, hex_sig)
            }
            SignatureScheme::Slack => {
                let value = header(headers, SLACK_SIGNATURE_HEADER)?;
                let hex_sig = value
                    .strip_prefix("v0=")
                    .ok_or_else(|| IntegrationError::MalformedSignature("expected v0= prefix".into()))?;
                let timestamp: i64 = header(headers, SLACK_TIMESTAMP_HEADER)?
                    .trim()
                    .parse()
                    .map_err(|_| IntegrationError::MalformedSignature("timestamp is not an integer".into()))?;

                // Timestamps are attacker controlled; the distance must not overflow
                let tolerance = u64::try_from(tolerance_secs).unwrap_or(0);
                let fresh = now
                    .checked_sub(timestamp)
                    .map(i64::unsigned_abs)
                    .is_some_and(|age| age <= tolerance);
                if !fresh {
                    return Err(IntegrationError::StaleTimestamp { timestamp, now });
                }

                verify_hex(secret, &slack_base_string(timestamp, body), hex_sig)
            }
            SignatureScheme::Hex => {
                let value = header(headers, HEX_SIGNATURE_HEADER)?;
                let hex_sig = value.strip_prefix("sha256=").unwrap_or(value);
                verify_hex(secret, body, hex_sig)
            }
        }
    }

    /// Headers a sender attaches so that `verify` accepts `body`
    pub fn sign_headers(&self, secret: &[u8], body: &[u8], now: i64) -> Vec<(&'static str, String)> {
        match self {
            SignatureScheme::GitHub => vec![(GITHUB_SIGNATURE_HEADER, format!("sha256={}", sign(secret, body)))],
            SignatureScheme::Slack => vec![
                (
                    SLACK_SIGNATURE_HEADER,
                    format!("v0={}", sign(secret, &slack_base_string(now, body))),
                ),
                (SLACK_TIMESTAMP_HEADER, now.to_string()),
            ],
            SignatureScheme::Hex => vec![(HEX_SIGNATURE_HEADER, sign(secret, body))],
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureScheme {
    type Err = IntegrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(SignatureScheme::GitHub),
            "slack" => Ok(SignatureScheme::Slack),
            "hex" | "hmac" => Ok(SignatureScheme::Hex),
            other => Err(IntegrationError::UnknownScheme(other.to_string())),
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, IntegrationError> {
    headers
        .get(name)
        .ok_or(IntegrationError::MissingSignature(name))?
        .to_str()
        .map_err(|_| IntegrationError::MalformedSignature(format!("{} is not valid ASCII", name)))
}

fn slack_base_string(timestamp: i64, body: &[u8]) -> Vec<u8> {
    let mut base = format!("v0:{}:", timestamp).into_bytes();
    base.extend_from_slice(body);
    base
}

fn mac(secret: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length
    <HmacSha256 as Mac>::new_from_slice(secret).unwrap_or_else(|_| unreachable!("HMAC takes keys of any size"))
}

/// Lowercase hex HMAC-SHA256 of `message`
pub fn sign(secret: &[u8], message: &[u8]) -> String {
    let mut mac = mac(secret);
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_hex(secret: &[u8], message: &[u8], signature: &str) -> Result<(), IntegrationError> {
    let expected = hex::decode(signature.trim())
        .map_err(|e| IntegrationError::MalformedSignature(format!("not hex: {}", e)))?;

    let mut mac = mac(secret);
    mac.update(message);
    mac.verify_slice(&expected)
        .map_err(|_| IntegrationError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &[u8] = b"It's a Secret to Everybody";
    const BODY: &[u8] = b"Hello, World!";

    fn headers(pairs: Vec<(&'static str, String)>) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(k, HeaderValue::from_str(&v).unwrap());
        }
        map
    }

    #[test]
    fn github_documented_vector() {
        // Example from GitHub's webhook validation guide
        assert_eq!(
            sign(SECRET, BODY),
            "757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
        );
    }

    #[test]
    fn each_scheme_accepts_its_own_headers() {
        let now = 1_700_000_000;
        for scheme in [SignatureScheme::GitHub, SignatureScheme::Slack, SignatureScheme::Hex] {
            let h = headers(scheme.sign_headers(SECRET, BODY, now));
            assert_eq!(scheme.verify(SECRET, &h, BODY, now, 300), Ok(()), "{}", scheme);
        }
    }

    #[test]
    fn tampered_body_is_rejected() {
        let h = headers(SignatureScheme::GitHub.sign_headers(SECRET, BODY, 0));
        assert_eq!(
            SignatureScheme::GitHub.verify(SECRET, &h, b"Hello, World?", 0, 300),
            Err(IntegrationError::InvalidSignature)
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let h = headers(SignatureScheme::Hex.sign_headers(b"other", BODY, 0));
        assert_eq!(
            SignatureScheme::Hex.verify(SECRET, &h, BODY, 0, 300),
            Err(IntegrationError::InvalidSignature)
        );
    }

    #[test]
    fn missing_and_malformed_headers() {
        assert_eq!(
            SignatureScheme::GitHub.verify(SECRET, &HeaderMap::new(), BODY, 0, 300),
            Err(IntegrationError::MissingSignature(GITHUB_SIGNATURE_HEADER))
        );

        let h = headers(vec![(GITHUB_SIGNATURE_HEADER, sign(SECRET, BODY))]);
        assert!(matches!(
            SignatureScheme::GitHub.verify(SECRET, &h, BODY, 0, 300),
            Err(IntegrationError::MalformedSignature(_))
        ));

        let h = headers(vec![(HEX_SIGNATURE_HEADER, "zz".to_string())]);
        assert!(matches!(
            SignatureScheme::Hex.verify(SECRET, &h, BODY, 0, 300),
            Err(IntegrationError::MalformedSignature(_))
        ));
    }

    #[test]
    fn slack_rejects_replayed_requests() {
        let signed_at = 1_700_000_000;
        let h = headers(SignatureScheme::Slack.sign_headers(SECRET, BODY, signed_at));
        assert_eq!(
            SignatureScheme::Slack.verify(SECRET, &h, BODY, signed_at + 301, 300),
            Err(IntegrationError::StaleTimestamp {
                timestamp: signed_at,
                now: signed_at + 301
            })
        );
        assert!(SignatureScheme::Slack.verify(SECRET, &h, BODY, signed_at + 300, 300).is_ok());
    }

    #[test]
    fn slack_extreme_timestamps_are_stale() {
        let now = 1_700_000_000;
        for timestamp in [i64::MIN, i64::MAX] {
            let h = headers(vec![
                (SLACK_SIGNATURE_HEADER, format!("v0={}", sign(SECRET, BODY))),
                (SLACK_TIMESTAMP_HEADER, timestamp.to_string()),
            ]);
            assert_eq!(
                SignatureScheme::Slack.verify(SECRET, &h, BODY, now, 300),
                Err(IntegrationError::StaleTimestamp { timestamp, now })
            );
        }
    }

    #[test]
    fn scheme_names() {
        assert_eq!("GitHub".parse::<SignatureScheme>().unwrap(), SignatureScheme::GitHub);
        assert_eq!("hmac".parse::<SignatureScheme>().unwrap(), SignatureScheme::Hex);
        assert!("md5".parse::<SignatureScheme>().is_err());
    }
}
