use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_database::{schema::USERS, DataStore, Query};
use shared_models::auth::{AuthUser, Role};

use crate::models::{RegisterUserRequest, UpdateUserRequest, User, UserError, UserListQuery};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("email pattern is valid")
});

static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9 ()\-]{7,20}$").expect("phone pattern is valid")
});

const MAX_NAME_LENGTH: usize = 200;
const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

pub struct UserService {
    store: Arc<dyn DataStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub async fn register(&self, identity: &AuthUser, request: RegisterUserRequest) -> Result<User, UserError> {
        debug!("Registering account for identity {}", identity.id);

        // The stored role must agree with the role the token authorizes.
        let role = request.role.unwrap_or(identity.role);
        if role != identity.role && !identity.is_admin() {
            warn!("Identity {} with role {} attempted to register as {}", identity.id, identity.role, role);
            return Err(UserError::Forbidden(format!("Token role {} cannot register as {}", identity.role, role)));
        }

        let email = request
            .email
            .or_else(|| identity.email.clone())
            .ok_or_else(|| UserError::ValidationError("email is required".to_string()))?;
        validate_email(&email)?;

        let full_name = validate_full_name(&request.full_name)?;
        if let Some(phone) = &request.phone {
            validate_phone(phone)?;
        }

        if self.find_user(&identity.id).await?.is_some() {
            return Err(UserError::AlreadyRegistered);
        }

        let now = Utc::now();
        let user = User {
            id: identity.id.clone(),
            email: email.trim().to_lowercase(),
            full_name,
            phone: request.phone,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let row = to_row(&user)?;
        self.store.insert(USERS, row).await?;

        info!("Registered {} account {}", user.role, user.id);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, UserError> {
        self.find_user(user_id).await?.ok_or(UserError::NotFound)
    }

    /// Looks up an active account holding `role`. Deactivated accounts and
    /// accounts with a different role are reported as not found.
    pub async fn get_active_user_with_role(&self, user_id: &str, role: Role) -> Result<User, UserError> {
        let user = self.get_user(user_id).await?;

        if !user.is_active || user.role != role {
            debug!("User {} is not an active {}", user_id, role);
            return Err(UserError::NotFound);
        }

        Ok(user)
    }

    pub async fn update_profile(&self, user_id: &str, request: UpdateUserRequest) -> Result<User, UserError> {
        debug!("Updating profile for user {}", user_id);

        let mut update_data = serde_json::Map::new();

        if let Some(full_name) = request.full_name {
            update_data.insert("full_name".to_string(), json!(validate_full_name(&full_name)?));
        }
        if let Some(phone) = request.phone {
            validate_phone(&phone)?;
            update_data.insert("phone".to_string(), json!(phone));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now()));

        self.update_user(user_id, Value::Object(update_data)).await
    }

    pub async fn set_active(&self, user_id: &str, is_active: bool) -> Result<User, UserError> {
        let user = self
            .update_user(user_id, json!({ "is_active": is_active, "updated_at": Utc::now() }))
            .await?;

        info!("User {} is_active set to {}", user_id, is_active);
        Ok(user)
    }

    pub async fn list_users(&self, query: UserListQuery) -> Result<Vec<User>, UserError> {
        let mut select = Query::new().order_by("created_at", true);

        if let Some(role) = query.role {
            select = select.eq("role", role);
        }
        if !query.include_inactive.unwrap_or(false) {
            select = select.eq("is_active", true);
        }

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        select = select.limit(limit).offset(query.offset.unwrap_or(0));

        let rows = self.store.select(USERS, &select).await?;
        rows.into_iter().map(from_row).collect()
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, UserError> {
        self.store
            .select_one(USERS, &Query::new().eq("id", user_id))
            .await?
            .map(from_row)
            .transpose()
    }

    async fn update_user(&self, user_id: &str, patch: Value) -> Result<User, UserError> {
        let rows = self
            .store
            .update(USERS, &Query::new().eq("id", user_id), patch)
            .await?;

        rows.into_iter().next().map(from_row).transpose()?.ok_or(UserError::NotFound)
    }
}

fn to_row(user: &User) -> Result<Value, UserError> {
    serde_json::to_value(user).map_err(|e| UserError::DatabaseError(format!("Failed to encode user: {}", e)))
}

fn from_row(row: Value) -> Result<User, UserError> {
    serde_json::from_value(row).map_err(|e| UserError::DatabaseError(format!("Failed to parse user: {}", e)))
}

fn validate_email(email: &str) -> Result<(), UserError> {
    if EMAIL_PATTERN.is_match(email.trim()) {
        Ok(())
    } else {
        Err(UserError::InvalidEmail(email.to_string()))
    }
}

fn validate_phone(phone: &str) -> Result<(), UserError> {
    if PHONE_PATTERN.is_match(phone) {
        Ok(())
    } else {
        Err(UserError::ValidationError(format!("Invalid phone number: {}", phone)))
    }
}

fn validate_full_name(name: &str) -> Result<String, UserError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(UserError::ValidationError("full_name must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(UserError::ValidationError(format!(
            "full_name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(validate_email("jane.doe+clinic@example.org").is_ok());
        assert!(validate_email("no-at-sign.example.org").is_err());
        assert!(validate_email("two@@example.org").is_err());
    }

    #[test]
    fn name_is_trimmed_and_bounded() {
        assert_eq!(validate_full_name("  Ada Lovelace ").unwrap(), "Ada Lovelace");
        assert!(validate_full_name("   ").is_err());
        assert!(validate_full_name(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn phone_validation() {
        assert!(validate_phone("+353 1 234 5678").is_ok());
        assert!(validate_phone("call me").is_err());
    }
}
