use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_database::AppState;
use shared_models::auth::{AuthUser, Role};
use shared_models::error::AppError;
use shared_utils::extractor::{require_role, AppJson, AppQuery};

use crate::models::{RegisterUserRequest, UpdateUserRequest, UserListQuery};
use crate::services::UserService;

fn ensure_self_or_admin(user: &AuthUser, user_id: &str) -> Result<(), AppError> {
    if user.id == user_id || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not authorized to access this account".to_string()))
    }
}

#[axum::debug_handler]
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(request): AppJson<RegisterUserRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = UserService::new(state.store.clone());
    let account = service.register(&user, request).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "user": account,
        "message": "Account registered successfully"
    }))))
}

#[axum::debug_handler]
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(state.store.clone());
    let account = service.get_user(&user.id).await?;

    Ok(Json(json!(account)))
}

#[axum::debug_handler]
pub async fn update_current_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(request): AppJson<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(state.store.clone());
    let account = service.update_profile(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "user": account,
        "message": "Profile updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    ensure_self_or_admin(&user, &user_id)?;

    let service = UserService::new(state.store.clone());
    let account = service.get_user(&user_id).await?;

    Ok(Json(json!(account)))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppQuery(query): AppQuery<UserListQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let service = UserService::new(state.store.clone());
    let users = service.list_users(query).await?;

    Ok(Json(json!({
        "users": users,
        "total": users.len()
    })))
}

#[axum::debug_handler]
pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    ensure_self_or_admin(&user, &user_id)?;

    let service = UserService::new(state.store.clone());
    let account = service.set_active(&user_id, false).await?;

    Ok(Json(json!({
        "success": true,
        "user": account,
        "message": "Account deactivated"
    })))
}

#[axum::debug_handler]
pub async fn reactivate_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let service = UserService::new(state.store.clone());
    let account = service.set_active(&user_id, true).await?;

    Ok(Json(json!({
        "success": true,
        "user": account,
        "message": "Account reactivated"
    })))
}
