//! Stateless bearer tokens.
//!
//! Tokens use the JWT compact layout with HS256:
//!
//! ```text
//! base64url(header) "." base64url(claims JSON) "." base64url(HMAC-SHA256)
//! ```
//!
//! The signature covers the first two segments verbatim. Verification checks
//! the signature before looking at the payload, so a token that is correctly
//! signed but past `exp` is reported as [`TokenError::Expired`], never as
//! [`TokenError::Malformed`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::auth::principal::Role;
use crate::config::TokenConfig;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

/// Signed payload of a token. Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Why a presented token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Wrong segment layout or undecodable header/payload.
    #[error("malformed token")]
    Malformed,

    /// Signature does not match the payload under the server key.
    #[error("token signature mismatch")]
    BadSignature,

    /// Signature is valid but the current time is at or past `exp`.
    #[error("token expired")]
    Expired,
}

impl TokenError {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::BadSignature => "bad_signature",
            TokenError::Expired => "expired",
        }
    }
}

/// Errors building a [`TokenService`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenConfigError {
    #[error("token secret must not be empty")]
    EmptySecret,

    #[error("token TTL must be at least one second")]
    ZeroTtl,
}

/// Issues and verifies bearer tokens with a process-wide HMAC key.
///
/// The key is read-only after construction, so a single instance is shared
/// behind an `Arc` by every request.
#[derive(Clone)]
pub struct TokenService {
    /// Keyed MAC, cloned per operation.
    mac: HmacSha256,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Result<Self, TokenConfigError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(TokenConfigError::EmptySecret);
        }
        if ttl.as_secs() == 0 {
            return Err(TokenConfigError::ZeroTtl);
        }
        // HMAC accepts keys of any length; only an empty key is refused above.
        let mac = <HmacSha256 as Mac>::new_from_slice(secret)
            .map_err(|_| TokenConfigError::EmptySecret)?;
        Ok(Self { mac, ttl })
    }

    pub fn from_config(config: &TokenConfig) -> Result<Self, TokenConfigError> {
        Self::new(config.secret.as_bytes(), Duration::from_secs(config.ttl_secs))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token valid from now for the configured TTL.
    pub fn issue(&self, subject: &str, email: &str, role: Role) -> String {
        self.issue_at(subject, email, role, unix_now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, subject: &str, email: &str, role: Role, now: u64) -> String {
        let claims = Claims {
            sub: subject.to_string(),
            email: email.to_string(),
            role,
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        };

        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };

        let signing_input = format!("{}.{}", encode_segment(&header), encode_segment(&claims));
        let signature = self.signature_for(&signing_input);
        format!("{}.{}", signing_input, signature)
    }

    /// Verify signature and expiry against the current time.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verify signature and expiry as if the current time were `now`.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, TokenError> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::Malformed);
        };

        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(TokenError::Malformed);
        }

        // An undecodable signature can never match, so it is a signature failure.
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::BadSignature)?;

        let signing_input = &token[..header.len() + 1 + payload.len()];
        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        // verify_slice compares in constant time.
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let header: Header = decode_segment(header)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Malformed);
        }

        let claims: Claims = decode_segment(payload)?;
        if claims.exp <= claims.iat {
            return Err(TokenError::Malformed);
        }
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Same validation as [`verify`](Self::verify).
    pub fn extract_claims(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token)
    }

    /// Subject of a fully verified token.
    pub fn extract_subject(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token).map(|claims| claims.sub)
    }

    fn signature_for(&self, signing_input: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

fn encode_segment<T: Serialize>(value: &T) -> String {
    // Header and Claims hold only strings, an enum and integers.
    let json = serde_json::to_vec(value).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
