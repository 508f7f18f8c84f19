use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{schema::NOTIFICATIONS, DataStore, Query};

use crate::models::{CreateNotificationRequest, Notification, NotificationError, NotificationListQuery};

const MAX_TITLE_LENGTH: usize = 200;
const MAX_MESSAGE_LENGTH: usize = 2000;
const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

/// Creation interface for notifications raised by other cells.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, request: CreateNotificationRequest) -> Result<Notification, NotificationError>;
}

pub struct NotificationService {
    store: Arc<dyn DataStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: CreateNotificationRequest) -> Result<Notification, NotificationError> {
        let title = request.title.trim();
        let message = request.message.trim();

        if request.user_id.trim().is_empty() {
            return Err(NotificationError::ValidationError("user_id must not be empty".to_string()));
        }
        if title.is_empty() || title.chars().count() > MAX_TITLE_LENGTH {
            return Err(NotificationError::ValidationError(format!(
                "title must be between 1 and {} characters",
                MAX_TITLE_LENGTH
            )));
        }
        if message.is_empty() || message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(NotificationError::ValidationError(format!(
                "message must be between 1 and {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            priority: request.priority.unwrap_or_else(|| request.notification_type.default_priority()),
            user_id: request.user_id,
            notification_type: request.notification_type,
            title: title.to_string(),
            message: message.to_string(),
            reference_id: request.reference_id,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        };

        let row = serde_json::to_value(&notification)
            .map_err(|e| NotificationError::DatabaseError(format!("Failed to encode notification: {}", e)))?;
        self.store.insert(NOTIFICATIONS, row).await?;

        debug!("Created {} notification {} for user {}",
               notification.notification_type, notification.id, notification.user_id);
        Ok(notification)
    }

    pub async fn list_for_user(&self, user_id: &str, query: NotificationListQuery) -> Result<Vec<Notification>, NotificationError> {
        let mut select = Query::new().eq("user_id", user_id);

        if query.unread_only.unwrap_or(false) {
            select = select.eq("is_read", false);
        }

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        select = select
            .order_by("created_at", false)
            .limit(limit)
            .offset(query.offset.unwrap_or(0));

        let rows = self.store.select(NOTIFICATIONS, &select).await?;
        rows.into_iter().map(from_row).collect()
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<usize, NotificationError> {
        let rows = self
            .store
            .select(NOTIFICATIONS, &Query::new().eq("user_id", user_id).eq("is_read", false))
            .await?;
        Ok(rows.len())
    }

    /// Only the recipient may mark a notification; anything else is reported
    /// as not found.
    pub async fn mark_read(&self, user_id: &str, notification_id: Uuid) -> Result<Notification, NotificationError> {
        let rows = self
            .store
            .update(
                NOTIFICATIONS,
                &Query::new().eq("id", notification_id).eq("user_id", user_id),
                json!({ "is_read": true, "read_at": Utc::now() }),
            )
            .await?;

        rows.into_iter()
            .next()
            .map(from_row)
            .transpose()?
            .ok_or(NotificationError::NotFound)
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<usize, NotificationError> {
        let rows = self
            .store
            .update(
                NOTIFICATIONS,
                &Query::new().eq("user_id", user_id).eq("is_read", false),
                json!({ "is_read": true, "read_at": Utc::now() }),
            )
            .await?;

        info!("Marked {} notifications read for user {}", rows.len(), user_id);
        Ok(rows.len())
    }

    pub async fn delete(&self, user_id: &str, notification_id: Uuid) -> Result<(), NotificationError> {
        let removed = self
            .store
            .delete(NOTIFICATIONS, &Query::new().eq("id", notification_id).eq("user_id", user_id))
            .await?;

        if removed == 0 {
            return Err(NotificationError::NotFound);
        }
        Ok(())
    }

    pub async fn delete_read(&self, user_id: &str) -> Result<usize, NotificationError> {
        let removed = self
            .store
            .delete(NOTIFICATIONS, &Query::new().eq("user_id", user_id).eq("is_read", true))
            .await?;

        info!("Pruned {} read notifications for user {}", removed, user_id);
        Ok(removed)
    }
}

#[async_trait]
impl NotificationDispatcher for NotificationService {
    async fn dispatch(&self, request: CreateNotificationRequest) -> Result<Notification, NotificationError> {
        self.create(request).await
    }
}

fn from_row(row: Value) -> Result<Notification, NotificationError> {
    serde_json::from_value(row)
        .map_err(|e| NotificationError::DatabaseError(format!("Failed to parse notification: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_database::MemoryStore;

    use crate::models::{NotificationPriority, NotificationType};

    fn request(user_id: &str, kind: NotificationType) -> CreateNotificationRequest {
        CreateNotificationRequest {
            user_id: user_id.to_string(),
            notification_type: kind,
            priority: None,
            title: "Appointment update".to_string(),
            message: "Your appointment changed".to_string(),
            reference_id: Some(Uuid::new_v4()),
        }
    }

    #[tokio::test]
    async fn priority_defaults_by_type() {
        let service = NotificationService::new(Arc::new(MemoryStore::new()));

        let booked = service.create(request("u1", NotificationType::AppointmentBooked)).await.unwrap();
        let cancelled = service.create(request("u1", NotificationType::AppointmentCancelled)).await.unwrap();

        assert_eq!(booked.priority, NotificationPriority::Normal);
        assert_eq!(cancelled.priority, NotificationPriority::High);
        assert!(!booked.is_read);
    }

    #[tokio::test]
    async fn rejects_blank_title() {
        let service = NotificationService::new(Arc::new(MemoryStore::new()));
        let mut bad = request("u1", NotificationType::System);
        bad.title = "  ".to_string();

        assert_matches!(service.create(bad).await, Err(NotificationError::ValidationError(_)));
    }

    #[tokio::test]
    async fn recipients_only_touch_their_own_notifications() {
        let service = NotificationService::new(Arc::new(MemoryStore::new()));
        let note = service.create(request("owner", NotificationType::System)).await.unwrap();

        assert_matches!(service.mark_read("intruder", note.id).await, Err(NotificationError::NotFound));
        assert_matches!(service.delete("intruder", note.id).await, Err(NotificationError::NotFound));

        let read = service.mark_read("owner", note.id).await.unwrap();
        assert!(read.is_read);
        assert!(read.read_at.is_some());
    }

    #[tokio::test]
    async fn unread_count_and_pruning() {
        let service = NotificationService::new(Arc::new(MemoryStore::new()));
        for _ in 0..3 {
            service.create(request("u1", NotificationType::AppointmentBooked)).await.unwrap();
        }
        service.create(request("u2", NotificationType::AppointmentBooked)).await.unwrap();

        assert_eq!(service.unread_count("u1").await.unwrap(), 3);
        assert_eq!(service.mark_all_read("u1").await.unwrap(), 3);
        assert_eq!(service.unread_count("u1").await.unwrap(), 0);

        assert_eq!(service.delete_read("u1").await.unwrap(), 3);
        assert!(service.list_for_user("u1", NotificationListQuery::default()).await.unwrap().is_empty());
        assert_eq!(service.unread_count("u2").await.unwrap(), 1);
    }
}
