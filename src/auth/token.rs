use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Claims, TokenIssuer, TokenVerifier};
use crate::domain::ids::{AccountId, PlayerId};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to issue token: {0}")]
    Issue(String),

    #[error("token is malformed")]
    Malformed,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token issued by an unknown issuer")]
    WrongIssuer,
}

/// Registered JWT claims plus the player id
#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    iss: String,
    sub: String,
    pid: i64,
    iat: i64,
    exp: i64,
}

/// HS256 JSON Web Tokens
pub struct JwtTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    expiration: Duration,
}

impl JwtTokenService {
    pub fn new(secret: impl AsRef<[u8]>, issuer: impl Into<String>, expiration: Duration) -> Self {
        let secret = secret.as_ref();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            expiration,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;
        validation
    }
}

impl TokenIssuer for JwtTokenService {
    fn issue(&self, claims: &Claims) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.expiration.as_secs())
            .map_err(|_| TokenError::Issue("expiration out of range".to_string()))?;

        let payload = JwtClaims {
            iss: self.issuer.clone(),
            sub: claims.account_id.get().to_string(),
            pid: claims.player_id.get(),
            iat: now,
            exp: now.saturating_add(ttl),
        };

        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|e| TokenError::Issue(e.to_string()))
    }
}

impl TokenVerifier for JwtTokenService {
    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<JwtClaims>(token, &self.decoding, &self.validation()).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidIssuer => TokenError::WrongIssuer,
                _ => TokenError::Malformed,
            }
        })?;

        let account_id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| TokenError::Malformed)?;

        Ok(Claims {
            account_id: AccountId(account_id),
            player_id: PlayerId(data.claims.pid),
        })
    }
}
