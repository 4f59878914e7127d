use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Application user, authenticated against the users table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub username: String,

    #[serde(rename = "fullName")]
    pub full_name: Option<String>,

    #[serde(rename = "isActive")]
    pub is_active: bool,

    /// Bcrypt hash; never serialized to clients
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    #[serde(rename = "createdAt")]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,

    #[serde(rename = "userId")]
    pub user_id: i32,

    pub username: String,

    #[serde(rename = "fullName")]
    pub full_name: Option<String>,
}
