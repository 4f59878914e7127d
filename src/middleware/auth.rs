use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::utils::jwt::{validate_token, JwtClaims};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

/// JWT authentication extractor.
///
/// Use this in endpoint handlers to enforce JWT authentication. The
/// extractor pulls the "Authorization: Bearer <token>" header, validates
/// the token, and injects the claims; the resulting user id is what the
/// ledger records on every transaction and audit row. Authentication never
/// happens below this layer.
#[derive(Debug, Clone)]
pub struct AuthUser(pub JwtClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> AppResult<Self> {
        // Extract Authorization header
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                tracing::warn!("Missing Authorization header");
                AppError::InvalidToken
            })?;

        // Extract token from "Bearer <token>" format
        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            tracing::warn!("Invalid Authorization header format (expected 'Bearer <token>')");
            AppError::InvalidToken
        })?;

        // Config travels in request extensions (inserted by the config layer)
        let config = parts.extensions.get::<Config>().ok_or_else(|| {
            tracing::error!("Config not found in request extensions");
            AppError::InternalError("Server configuration error".to_string())
        })?;

        // Validate JWT token
        let claims = validate_token(token, config)?;

        tracing::debug!(
            user_id = %claims.sub,
            username = %claims.username,
            "Request authenticated"
        );

        Ok(AuthUser(claims))
    }
}

/// Extract Config from request extensions.
///
/// For endpoints that need configuration without requiring authentication
/// (login), and for handlers that need the retry policy.
#[derive(Clone)]
pub struct AppConfig(pub Config);

#[async_trait]
impl<S> FromRequestParts<S> for AppConfig
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> AppResult<Self> {
        let config = parts
            .extensions
            .get::<Config>()
            .ok_or_else(|| {
                tracing::error!("Config not found in request extensions");
                AppError::InternalError("Server configuration error".to_string())
            })?
            .clone();

        Ok(AppConfig(config))
    }
}
