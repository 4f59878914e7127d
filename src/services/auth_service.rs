use crate::config::Config;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::user::{LoginResponse, User};
use crate::utils::jwt::generate_token;
use chrono::NaiveDateTime;
use tiberius::Query;

/// Authenticate a user against the users table and issue a JWT.
pub async fn login(
    pool: &DbPool,
    config: &Config,
    username: &str,
    password: &str,
) -> AppResult<LoginResponse> {
    let user = find_user(pool, username).await?;

    if !user.is_active {
        tracing::warn!(username = %username, "Login attempt for inactive user");
        return Err(AppError::InvalidCredentials);
    }

    let password_hash = user
        .password_hash
        .as_deref()
        .ok_or(AppError::InvalidCredentials)?;

    let valid = bcrypt::verify(password, password_hash)?;
    if !valid {
        tracing::warn!(username = %username, "Invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = generate_token(&user, config)?;

    tracing::info!(user_id = user.id, username = %user.username, "User logged in");

    Ok(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
        full_name: user.full_name,
    })
}

async fn find_user(pool: &DbPool, username: &str) -> AppResult<User> {
    let mut conn = pool.get().await?;

    let sql = r#"
        SELECT id, username, full_name, is_active, password_hash, created_at
        FROM users
        WHERE username = @P1
    "#;

    let mut query = Query::new(sql);
    query.bind(username);

    let row = query
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    Ok(User {
        id: row.get::<i32, _>(0).unwrap_or(0),
        username: row.get::<&str, _>(1).unwrap_or("").to_string(),
        full_name: row.get::<&str, _>(2).map(|s| s.to_string()),
        is_active: row.get::<bool, _>(3).unwrap_or(false),
        password_hash: row.get::<&str, _>(4).map(|s| s.to_string()),
        created_at: row.try_get::<NaiveDateTime, _>(5).ok().flatten(),
    })
}
