use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Principal, Role};
use crate::errors::AppError;

/// Default token lifetime: 30 days.
pub const DEFAULT_EXP_HOURS: i64 = 720;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        if secret.is_empty() {
            return Err(AppError::configuration("JWT_SECRET must not be empty"));
        }
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(DEFAULT_EXP_HOURS))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self::new(secret.into_bytes(), exp_hours))
    }

    pub fn encode(&self, principal: &Principal) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: principal.id,
            name: principal.name.clone(),
            email: principal.email.clone(),
            role: principal.role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::internal(format!("token signing failed: {err}")))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::unauthenticated(format!("invalid token: {err}")))
    }

    /// Maps a bearer credential to the identity it was issued for. Empty,
    /// malformed, forged and expired credentials are all `Unauthenticated`.
    pub fn resolve_principal(&self, credential: &str) -> Result<Principal, AppError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(AppError::unauthenticated("credential missing"));
        }

        let claims = self.decode(credential)?;
        let principal = Principal::new(claims.sub, claims.name, claims.email, claims.role);
        tracing::debug!(principal_id = %principal.id, role = %principal.role, "principal resolved");
        Ok(principal)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthenticated("Authorization header missing"))?;

        state.jwt.resolve_principal(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teacher() -> Principal {
        Principal::new(Uuid::new_v4(), "Anne", "anne@school.test", Role::Teacher)
    }

    #[test]
    fn token_resolves_to_the_same_principal() {
        let jwt = JwtConfig::new("test-secret", 1);
        let principal = teacher();
        let token = jwt.encode(&principal).unwrap();
        assert_eq!(jwt.resolve_principal(&token).unwrap(), principal);
    }

    #[test]
    fn expired_token_is_unauthenticated() {
        let jwt = JwtConfig::new("test-secret", -1);
        let token = jwt.encode(&teacher()).unwrap();
        assert!(matches!(jwt.resolve_principal(&token), Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn forged_token_is_unauthenticated() {
        let token = JwtConfig::new("someone-else", 1).encode(&teacher()).unwrap();
        let jwt = JwtConfig::new("test-secret", 1);
        assert!(matches!(jwt.resolve_principal(&token), Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn empty_and_malformed_credentials_are_unauthenticated() {
        let jwt = JwtConfig::new("test-secret", 1);
        assert!(matches!(jwt.resolve_principal("  "), Err(AppError::Unauthenticated(_))));
        assert!(matches!(jwt.resolve_principal("not.a.jwt"), Err(AppError::Unauthenticated(_))));
    }
}
