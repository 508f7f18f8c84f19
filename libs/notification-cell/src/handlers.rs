use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::AppState;
use shared_models::auth::{AuthUser, Role};
use shared_models::error::AppError;
use shared_utils::extractor::{require_role, AppJson, AppQuery};

use crate::models::{CreateNotificationRequest, NotificationListQuery};
use crate::services::NotificationService;

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppQuery(query): AppQuery<NotificationListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(state.store.clone());
    let notifications = service.list_for_user(&user.id, query).await?;

    Ok(Json(json!({
        "notifications": notifications,
        "total": notifications.len()
    })))
}

#[axum::debug_handler]
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(state.store.clone());
    let count = service.unread_count(&user.id).await?;

    Ok(Json(json!({ "unread_count": count })))
}

#[axum::debug_handler]
pub async fn create_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(request): AppJson<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, &[Role::Admin])?;

    let service = NotificationService::new(state.store.clone());
    let notification = service.create(request).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "notification": notification
    }))))
}

#[axum::debug_handler]
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(state.store.clone());
    let notification = service.mark_read(&user.id, notification_id).await?;

    Ok(Json(json!({
        "success": true,
        "notification": notification
    })))
}

#[axum::debug_handler]
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(state.store.clone());
    let updated = service.mark_all_read(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "updated": updated
    })))
}

#[axum::debug_handler]
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = NotificationService::new(state.store.clone());
    service.delete(&user.id, notification_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn delete_read_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(state.store.clone());
    let deleted = service.delete_read(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "deleted": deleted
    })))
}
