/*!
 * Authentication and authorization.
 *
 * Access tokens are HS256 JWTs issued by this service. The identity
 * provider remains the source of truth for user ids; tokens only carry
 * the subject, email and role so handlers can make access decisions
 * without a database round trip.
 */

use async_trait::async_trait;
use axum::extract::FromRef;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::entities::user::UserRole;
use crate::errors::ServiceError;

pub mod policy;

/// Claim structure for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id as issued by the identity provider)
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated caller extracted from a bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_seller(&self) -> bool {
        self.role == UserRole::Seller
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_issuer: String,
        jwt_audience: String,
        token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            token_expiration,
        }
    }
}

/// Issues and validates access tokens
pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issues a signed access token for the given user
    pub fn issue_token(
        &self,
        user_id: &str,
        email: &str,
        role: UserRole,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::from_std(self.config.token_expiration).unwrap_or_else(|_| chrono::Duration::hours(24))).timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(ServiceError::from)
    }

    /// Validates a token and returns the caller it identifies
    pub fn validate_token(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.jwt_issuer]);
        validation.set_audience(&[&self.config.jwt_audience]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!("token validation failed: {}", e);
            ServiceError::Unauthorized("Invalid or expired token".to_string())
        })?;

        let claims = token_data.claims;
        let role = claims
            .role
            .parse::<UserRole>()
            .map_err(|_| ServiceError::Unauthorized("Unknown role in token".to_string()))?;

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
            role,
        })
    }
}

/// Extracts the bearer token from an Authorization header value
fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .or_else(|| header_value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = Arc::<AuthService>::from_ref(state);

        let header_value = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("Missing Authorization header".to_string())
            })?;

        let token = bearer_token(header_value).ok_or_else(|| {
            ServiceError::Unauthorized("Malformed Authorization header".to_string())
        })?;

        auth_service.validate_token(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "test-secret-key-that-is-long-enough!".to_string(),
            "marketplace-api".to_string(),
            "marketplace-clients".to_string(),
            Duration::from_secs(3600),
        ))
    }

    #[test]
    fn round_trips_claims() {
        let service = test_service();
        let token = service
            .issue_token("user_abc", "abc@example.com", UserRole::Seller)
            .unwrap();

        let user = service.validate_token(&token).unwrap();
        assert_eq!(user.user_id, "user_abc");
        assert_eq!(user.email, "abc@example.com");
        assert_eq!(user.role, UserRole::Seller);
    }

    #[test]
    fn rejects_token_from_other_secret() {
        let service = test_service();
        let other = AuthService::new(AuthConfig::new(
            "another-secret-key-that-is-long-too!".to_string(),
            "marketplace-api".to_string(),
            "marketplace-clients".to_string(),
            Duration::from_secs(3600),
        ));

        let token = other
            .issue_token("user_abc", "abc@example.com", UserRole::Client)
            .unwrap();
        assert!(service.validate_token(&token).is_err());
    }

    #[test]
    fn rejects_wrong_issuer() {
        let token_service = AuthService::new(AuthConfig::new(
            "test-secret-key-that-is-long-enough!".to_string(),
            "someone-else".to_string(),
            "marketplace-clients".to_string(),
            Duration::from_secs(3600),
        ));
        let token = token_service
            .issue_token("user_abc", "abc@example.com", UserRole::Client)
            .unwrap();

        assert!(test_service().validate_token(&token).is_err());
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
