use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::user::User;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims carried by every authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Username
    pub username: String,

    /// Issued at (UNIX timestamp)
    pub iat: i64,

    /// Expiration (UNIX timestamp)
    pub exp: i64,

    /// Issuer
    pub iss: String,
}

impl JwtClaims {
    /// Numeric user id for audit attribution on ledger operations.
    pub fn user_id(&self) -> AppResult<i32> {
        self.sub
            .parse()
            .map_err(|_| AppError::InvalidToken)
    }
}

/// Generate JWT token for authenticated user
///
/// # Arguments
/// * `user` - Authenticated user from database
/// * `config` - Application configuration (contains JWT secret and duration)
///
/// # Returns
/// * JWT token string valid for JWT_DURATION_HOURS (default: 168 hours / 7 days)
pub fn generate_token(user: &User, config: &Config) -> AppResult<String> {
    let now = Utc::now();
    let expiration = now + Duration::hours(config.jwt_duration_hours);

    let claims = JwtClaims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        iat: now.timestamp(),
        exp: expiration.timestamp(),
        iss: config.jwt_issuer.clone(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(format!("Failed to generate token: {}", e)))?;

    tracing::debug!(
        user_id = user.id,
        username = %user.username,
        expires_at = %expiration,
        "Generated JWT token"
    );

    Ok(token)
}

/// Validate JWT token and extract claims
///
/// # Arguments
/// * `token` - JWT token string (without "Bearer " prefix)
/// * `config` - Application configuration (contains JWT secret for validation)
///
/// # Returns
/// * Validated JwtClaims if token is valid and not expired
/// * AppError::InvalidToken if token is invalid, expired, or malformed
pub fn validate_token(token: &str, config: &Config) -> AppResult<JwtClaims> {
    let mut validation = Validation::default();
    validation.set_issuer(&[&config.jwt_issuer]);

    let token_data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Token validation failed");
        AppError::InvalidToken
    })?;

    Ok(token_data.claims)
}
