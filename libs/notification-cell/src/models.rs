use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    AppointmentBooked,
    AppointmentConfirmed,
    AppointmentCancelled,
    AppointmentRescheduled,
    AppointmentCompleted,
    AppointmentNoShow,
    System,
}

impl NotificationType {
    pub fn default_priority(&self) -> NotificationPriority {
        match self {
            NotificationType::AppointmentCancelled | NotificationType::AppointmentNoShow => NotificationPriority::High,
            _ => NotificationPriority::Normal,
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationType::AppointmentBooked => "appointment_booked",
            NotificationType::AppointmentConfirmed => "appointment_confirmed",
            NotificationType::AppointmentCancelled => "appointment_cancelled",
            NotificationType::AppointmentRescheduled => "appointment_rescheduled",
            NotificationType::AppointmentCompleted => "appointment_completed",
            NotificationType::AppointmentNoShow => "appointment_no_show",
            NotificationType::System => "system",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    pub reference_id: Option<Uuid>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotificationRequest {
    pub user_id: String,
    pub notification_type: NotificationType,
    pub priority: Option<NotificationPriority>,
    pub title: String,
    pub message: String,
    pub reference_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationListQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for NotificationError {
    fn from(err: StoreError) -> Self {
        NotificationError::DatabaseError(err.to_string())
    }
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound => AppError::NotFound(err.to_string()),
            NotificationError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            NotificationError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
