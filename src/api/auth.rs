use axum::{extract::State, Json};

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AppConfig, AuthUser};
use crate::models::user::{LoginRequest, LoginResponse};
use crate::services::auth_service;
use crate::utils::jwt::JwtClaims;

/// POST /api/auth/login
/// Authenticate with username and password, receive a JWT.
pub async fn login_endpoint(
    State(pool): State<DbPool>,
    AppConfig(config): AppConfig,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::ValidationError(
            "Username and password are required".to_string(),
        ));
    }

    let response =
        auth_service::login(&pool, &config, request.username.trim(), &request.password).await?;

    Ok(Json(response))
}

/// GET /api/auth/me
/// Echo the authenticated user's claims.
pub async fn get_current_user_endpoint(AuthUser(claims): AuthUser) -> Json<JwtClaims> {
    Json(claims)
}
