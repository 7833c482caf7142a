use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Result, SwapError};

pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(SESSION_TTL_DAYS),
        }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SwapError::Store(anyhow::anyhow!("token signing failed: {}", e)))
    }

    /// Returns the user id carried by a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Result<Uuid> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected session token");
                SwapError::Unauthorized("invalid or expired token".into())
            })?;
        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| SwapError::Unauthorized("invalid token subject".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_then_verify() {
        let issuer = TokenIssuer::new("test-secret");
        let user_id = Uuid::new_v4();
        let token = issuer.issue(user_id).unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), user_id);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenIssuer::new("a").issue(Uuid::new_v4()).unwrap();
        let err = TokenIssuer::new("b").verify(&token).unwrap_err();
        assert!(matches!(err, SwapError::Unauthorized(_)));
        assert!(TokenIssuer::new("a").verify("garbage").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = TokenIssuer::new("s");
        let past = Utc::now() - Duration::days(8);
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            iat: past.timestamp(),
            exp: (past + Duration::days(1)).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"s")).unwrap();
        assert!(issuer.verify(&token).is_err());
    }
}
