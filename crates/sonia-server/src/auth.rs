//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying the user id. Clients send them either as
//! the raw `Authorization` header value or as `Bearer <token>`.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sonia_config::AuthSettings;
use sonia_core::User;
use tracing::debug;

use crate::error::AppError;
use crate::ServerState;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs a token for `user_id` valid for the configured number of days.
pub fn issue_token(user_id: &str, settings: &AuthSettings) -> Result<String, AppError> {
    let iat = chrono::Utc::now().timestamp();
    let exp = settings
        .token_ttl_days
        .checked_mul(SECONDS_PER_DAY)
        .and_then(|ttl| iat.checked_add(ttl))
        .ok_or_else(|| AppError::internal(format!("token lifetime of {} days is out of range", settings.token_ttl_days)))?;
    let claims = Claims { id: user_id.to_string(), iat, exp };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(settings.jwt_secret.as_bytes()))
        .map_err(AppError::internal)
}

pub fn verify_token(token: &str, settings: &AuthSettings) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!("Token rejected: {}", e);
        AppError::unauthorized("Invalid token")
    })
}

/// Strips an optional `Bearer ` prefix.
pub fn bearer_token(header: &str) -> &str {
    let header = header.trim();
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .unwrap_or(header)
        .trim()
}

/// Resolves a token to a stored user.
pub fn authenticate(state: &ServerState, token: &str) -> Result<User, AppError> {
    if token.is_empty() {
        return Err(AppError::unauthorized("No token"));
    }
    let claims = verify_token(token, &state.config.auth)?;
    state
        .store
        .get_user(&claims.id)?
        .ok_or_else(|| AppError::unauthorized("Invalid token"))
}

/// The user behind the request's `Authorization` header.
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<ServerState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<ServerState>) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("No token"))?;
        authenticate(state, bearer_token(header)).map(AuthUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AuthSettings {
        AuthSettings { jwt_secret: "test-secret".into(), token_ttl_days: 7, bcrypt_cost: 4 }
    }

    #[test]
    fn test_issue_and_verify() {
        let token = issue_token("user-1", &settings()).unwrap();
        let claims = verify_token(&token, &settings()).unwrap();
        assert_eq!(claims.id, "user-1");
        assert_eq!(claims.exp - claims.iat, 7 * SECONDS_PER_DAY);
    }

    #[test]
    fn test_rejects_wrong_secret_and_expired() {
        let token = issue_token("user-1", &settings()).unwrap();
        let other = AuthSettings { jwt_secret: "other".into(), ..settings() };
        assert!(verify_token(&token, &other).is_err());

        let expired = AuthSettings { token_ttl_days: -1, ..settings() };
        let token = issue_token("user-1", &expired).unwrap();
        assert!(verify_token(&token, &settings()).is_err());
        assert!(verify_token("garbage", &settings()).is_err());
    }

    #[test]
    fn test_oversized_lifetime_is_an_error() {
        let huge = AuthSettings { token_ttl_days: 1_000_000_000_000_000, ..settings() };
        let err = issue_token("user-1", &huge).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_bearer_prefix_is_optional() {
        assert_eq!(bearer_token("Bearer abc.def"), "abc.def");
        assert_eq!(bearer_token("abc.def"), "abc.def");
        assert_eq!(bearer_token("  Bearer  abc "), "abc");
    }
}
