//! Credential tokens for hub connections.
//!
//! A token is `hex(claims_json) "." hex(hmac_sha256(secret, claims_json))`.
//! The claims name the user, optionally their company, and an expiry in
//! Unix seconds. [`TokenVerifier`] is the seam: any issuer can be plugged
//! in as long as it recovers the same [`Claims`].

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tycoon_types::{CompanyId, UserId};

type HmacSha256 = Hmac<Sha256>;

/// Errors from issuing or verifying a token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The signing secret is empty.
    #[error("token secret must not be empty")]
    EmptySecret,

    /// The token is not `payload.signature` in hex, or the payload is not
    /// valid claims.
    #[error("malformed token: {0}")]
    Malformed(&'static str),

    /// The signature does not match the payload.
    #[error("token signature mismatch")]
    BadSignature,

    /// The token is past its expiry.
    #[error("token expired at {exp}")]
    Expired {
        /// Expiry in Unix seconds.
        exp: i64,
    },

    /// Claims could not be encoded.
    #[error("failed to encode claims: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Identity carried by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Authenticated user.
    pub user_id: UserId,
    /// The user's company, if they have one.
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    /// Expiry in Unix seconds.
    pub exp: i64,
}

impl Claims {
    /// Claims expiring `ttl` after `now`.
    pub fn new(
        user_id: UserId,
        company_id: Option<CompanyId>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let exp = now.checked_add_signed(ttl).unwrap_or(now).timestamp();
        Self {
            user_id,
            company_id,
            exp,
        }
    }
}

/// Recovers [`Claims`] from a presented token.
pub trait TokenVerifier: Send + Sync {
    /// Verify `token` against the current time.
    fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

/// HMAC-SHA256 issuer and verifier sharing one secret.
#[derive(Clone)]
pub struct HmacTokenVerifier {
    key: Vec<u8>,
}

impl std::fmt::Debug for HmacTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacTokenVerifier").finish_non_exhaustive()
    }
}

impl HmacTokenVerifier {
    /// A verifier for `secret`.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, AuthError> {
        let key = secret.into();
        if key.is_empty() {
            return Err(AuthError::EmptySecret);
        }
        Ok(Self { key })
    }

    /// Sign `claims` into a token.
    pub fn issue(&self, claims: &Claims) -> Result<String, AuthError> {
        let payload = serde_json::to_vec(claims)?;
        let signature = self.mac(&payload)?.finalize().into_bytes();
        Ok(format!("{}.{}", hex::encode(&payload), hex::encode(signature)))
    }

    /// Verify `token` as of `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let (payload_hex, signature_hex) = token
            .split_once('.')
            .ok_or(AuthError::Malformed("missing signature separator"))?;
        let payload = hex::decode(payload_hex)
            .map_err(|_e| AuthError::Malformed("payload is not hex"))?;
        let signature = hex::decode(signature_hex)
            .map_err(|_e| AuthError::Malformed("signature is not hex"))?;

        self.mac(&payload)?
            .verify_slice(&signature)
            .map_err(|_e| AuthError::BadSignature)?;

        let claims: Claims = serde_json::from_slice(&payload)
            .map_err(|_e| AuthError::Malformed("payload is not valid claims"))?;
        if claims.exp <= now.timestamp() {
            return Err(AuthError::Expired { exp: claims.exp });
        }
        Ok(claims)
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_e| AuthError::EmptySecret)?;
        mac.update(payload);
        Ok(mac)
    }
}

impl TokenVerifier for HmacTokenVerifier {
    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn verifier() -> HmacTokenVerifier {
        HmacTokenVerifier::new("test-secret").unwrap()
    }

    fn claims(now: DateTime<Utc>) -> Claims {
        Claims::new(UserId::new(), Some(CompanyId::new()), now, Duration::hours(1))
    }

    #[test]
    fn issued_token_verifies() {
        let now = Utc::now();
        let claims = claims(now);
        let token = verifier().issue(&claims).unwrap();
        assert_eq!(verifier().verify_at(&token, now).unwrap(), claims);
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            HmacTokenVerifier::new(""),
            Err(AuthError::EmptySecret)
        ));
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let now = Utc::now();
        let other = HmacTokenVerifier::new("other-secret").unwrap();
        let token = other.issue(&claims(now)).unwrap();
        assert!(matches!(
            verifier().verify_at(&token, now),
            Err(AuthError::BadSignature)
        ));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let now = Utc::now();
        let token = verifier().issue(&claims(now)).unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let forged = serde_json::to_vec(&claims(now)).unwrap();
        let forged = format!("{}.{signature}", hex::encode(forged));
        assert!(matches!(
            verifier().verify_at(&forged, now),
            Err(AuthError::BadSignature)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now();
        let token = verifier().issue(&claims(now)).unwrap();
        let later = now.checked_add_signed(Duration::hours(2)).unwrap();
        assert!(matches!(
            verifier().verify_at(&token, later),
            Err(AuthError::Expired { .. })
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let now = Utc::now();
        for token in ["", "nodot", "zz.zz", "abcd.zz"] {
            assert!(matches!(
                verifier().verify_at(token, now),
                Err(AuthError::Malformed(_))
            ));
        }
    }
}
