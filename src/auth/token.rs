use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id, as a string per RFC 7519.
    pub sub: String,
    pub role: Role,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signing keys and token lifetimes.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue(&self, user_id: i64, role: Role, kind: TokenKind) -> AppResult<String> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
    }

    /// Decodes and checks signature, expiry and token kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::debug!("rejected token: {e}");
                AppError::Unauthorized
            })?;
        if data.claims.kind != expected {
            return Err(AppError::Unauthorized);
        }
        Ok(data.claims)
    }
}

impl Claims {
    pub fn user_id(&self) -> AppResult<i64> {
        self.sub.parse().map_err(|_| AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::new("test-secret-test-secret", Duration::minutes(5), Duration::days(1))
    }

    #[test]
    fn access_token_verifies() {
        let k = keys();
        let token = k.issue(7, Role::Staff, TokenKind::Access).unwrap();
        let claims = k.verify(&token, TokenKind::Access).unwrap();
        assert_eq!((claims.user_id().unwrap(), claims.role), (7, Role::Staff));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let k = keys();
        let token = k.issue(7, Role::Student, TokenKind::Refresh).unwrap();
        assert!(matches!(k.verify(&token, TokenKind::Access), Err(AppError::Unauthorized)));
        assert!(k.verify(&token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let k = TokenKeys::new("test-secret-test-secret", Duration::minutes(-10), Duration::days(1));
        let token = k.issue(1, Role::Admin, TokenKind::Access).unwrap();
        assert!(matches!(k.verify(&token, TokenKind::Access), Err(AppError::Unauthorized)));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let other = TokenKeys::new("another-secret-value!!", Duration::minutes(5), Duration::days(1));
        let token = other.issue(1, Role::Admin, TokenKind::Access).unwrap();
        assert!(keys().verify(&token, TokenKind::Access).is_err());
    }
}
