use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared_database::StoreError;
use shared_models::auth::Role;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    /// Defaults to the email carried by the token.
    pub email: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    /// Defaults to the token role.
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub include_inactive: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("An account is already registered for this identity")]
    AlreadyRegistered,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for UserError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(_) => UserError::AlreadyRegistered,
            other => UserError::DatabaseError(other.to_string()),
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => AppError::NotFound(err.to_string()),
            UserError::AlreadyRegistered => AppError::Conflict(err.to_string()),
            UserError::InvalidEmail(_) | UserError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            UserError::Forbidden(msg) => AppError::Forbidden(msg),
            UserError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
