//! Bearer credential issuance and verification (HS256 JWT).
//!
//! Verification never touches the store: a disabled identity keeps a working
//! token until `exp`. Keep `--token-ttl-seconds` short when that window matters.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::{AuthContext, Role};

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const MIN_SECRET_BYTES: usize = 32;

/// Token payload. Field names are part of the wire format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub site_id: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token encoding failed: {0}")]
    Encode(String),
}

/// A freshly signed credential.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build the codec from the process-wide signing secret.
    ///
    /// # Errors
    /// Fails when the secret is shorter than [`MIN_SECRET_BYTES`] or the TTL is not positive;
    /// both are startup-fatal misconfigurations.
    pub fn new(secret: &SecretString, ttl_seconds: i64) -> Result<Self> {
        let secret = secret.expose_secret().as_bytes();
        if secret.len() < MIN_SECRET_BYTES {
            return Err(anyhow!(
                "JWT secret must be at least {MIN_SECRET_BYTES} bytes, got {}",
                secret.len()
            ));
        }
        if ttl_seconds <= 0 {
            return Err(anyhow!("token TTL must be positive, got {ttl_seconds}"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl_seconds,
        })
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Sign a credential for `subject`, valid for the configured TTL.
    ///
    /// # Errors
    /// Returns [`TokenError::Encode`] if the claims cannot be serialized.
    pub fn issue(&self, subject: &AuthContext) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        subject: &AuthContext,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let iat = issued_at.timestamp();
        let exp = iat.saturating_add(self.ttl_seconds);
        let claims = Claims {
            user_id: subject.user_id(),
            email: subject.email().to_string(),
            role: subject.role(),
            site_id: subject.site_id(),
            iat,
            exp,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| TokenError::Encode(err.to_string()))?;
        let expires_at = DateTime::<Utc>::from_timestamp(exp, 0).unwrap_or(issued_at);
        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature and expiry and rebuild the request context.
    ///
    /// # Errors
    /// Any failure is a [`TokenError`] value; payloads that break the
    /// role/site invariant are reported as [`TokenError::Malformed`].
    pub fn verify(&self, token: &str) -> Result<AuthContext, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            })?;
        let claims = data.claims;
        AuthContext::new(claims.user_id, claims.email, claims.role, claims.site_id)
            .ok_or(TokenError::Malformed)
    }
}
