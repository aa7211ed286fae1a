use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::problem::ApiError;
use crate::router::AppState;

/// Verifies HS256 bearer tokens minted by the identity provider.
#[derive(Clone)]
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        // Expiry is checked against the application clock instead.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| TokenError::Invalid(err.to_string()))?
            .claims;

        if claims.sub.trim().is_empty() {
            return Err(TokenError::Invalid("empty_subject".to_string()));
        }
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenClaims {
    /// Email address of the signed-in merchant.
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token expired")]
    Expired,
}

/// Authenticated merchant, passed explicitly to every owner-scoped handler.
#[derive(Debug, Clone)]
pub struct Merchant {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Merchant {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthenticated)?;

        let now = state.now();
        let claims = state.token_validator().validate(token, now).map_err(|err| {
            debug!(stage = "auth", error = %err, "bearer token rejected");
            ApiError::Unauthenticated
        })?;

        let user = state
            .database()
            .users()
            .upsert_by_email(claims.sub.trim(), claims.name.as_deref(), now)
            .await?;

        Ok(Self {
            user_id: user.id,
            email: user.email,
            name: user.name,
        })
    }
}
