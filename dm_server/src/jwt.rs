//! HS256 bearer token verification.
//!
//! Tokens are issued by the external identity service with the shared
//! `JWT_SECRET`. The `sub` claim is the marketplace user ID.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dress_market::UserId;
use dress_market::identity::{AuthError, IdentityProvider, UserIdentity};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: UserId,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Identity provider backed by HS256 JWTs
pub struct JwtIdentity {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl JwtIdentity {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Sign a token for `user_id` valid for `ttl`. Used for local demo runs;
    /// in production tokens come from the identity service.
    pub fn issue_token(
        &self,
        user_id: UserId,
        email: Option<String>,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let claims = AccessTokenClaims {
            sub: user_id,
            exp: (Utc::now() + ttl).timestamp(),
            email,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentity {
    async fn current_user(&self, token: &str) -> Result<UserIdentity, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        Ok(UserIdentity {
            user_id: token_data.claims.sub,
            email: token_data.claims.email,
        })
    }
}
