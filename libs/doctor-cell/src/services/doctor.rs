use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{schema::DOCTORS, DataStore, Query};
use shared_models::auth::{AuthUser, Role};
use user_cell::{UserError, UserService};

use crate::models::{
    AvailabilityWindow, CreateDoctorRequest, Doctor, DoctorError, DoctorSearchQuery, UpdateDoctorRequest,
    DEFAULT_SLOT_MINUTES, MAX_SLOT_MINUTES, MIN_SLOT_MINUTES,
};
use crate::services::availability::validate_windows;

const MAX_BIO_LENGTH: usize = 2000;
const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

pub struct DoctorService {
    store: Arc<dyn DataStore>,
}

impl DoctorService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Create a doctor profile for a user holding the doctor role.
    pub async fn create_doctor(&self, actor: &AuthUser, request: CreateDoctorRequest) -> Result<Doctor, DoctorError> {
        let user_id = match actor.role {
            Role::Admin => request
                .user_id
                .clone()
                .ok_or_else(|| DoctorError::ValidationError("user_id is required".to_string()))?,
            Role::Doctor => {
                if request.user_id.as_deref().is_some_and(|id| id != actor.id) {
                    return Err(DoctorError::Forbidden("Doctors can only create their own profile".to_string()));
                }
                actor.id.clone()
            }
            Role::Patient => {
                warn!("Patient {} attempted to create a doctor profile", actor.id);
                return Err(DoctorError::Forbidden("Only doctors or administrators can create doctor profiles".to_string()));
            }
        };

        debug!("Creating doctor profile for user {}", user_id);

        let specialization = required_text("specialization", &request.specialization)?;
        let license_number = required_text("license_number", &request.license_number)?;
        if let Some(bio) = &request.bio {
            validate_bio(bio)?;
        }
        let slot_minutes = request.slot_minutes.unwrap_or(DEFAULT_SLOT_MINUTES);
        validate_slot_minutes(slot_minutes)?;
        let availability = validate_windows(request.availability.unwrap_or_default())?;

        let account = UserService::new(self.store.clone())
            .get_active_user_with_role(&user_id, Role::Doctor)
            .await
            .map_err(|e| match e {
                UserError::NotFound => DoctorError::UserNotFound(user_id.clone()),
                other => DoctorError::DatabaseError(other.to_string()),
            })?;

        if self.find_by_user_id(&user_id).await?.is_some() {
            return Err(DoctorError::AlreadyExists(format!("A doctor profile already exists for user {}", user_id)));
        }

        let existing_license = self
            .store
            .select_one(DOCTORS, &Query::new().eq("license_number", &license_number))
            .await?;
        if existing_license.is_some() {
            return Err(DoctorError::AlreadyExists(format!(
                "License number {} is already registered",
                license_number
            )));
        }

        let now = Utc::now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            user_id,
            full_name: account.full_name,
            specialization,
            license_number,
            bio: request.bio,
            slot_minutes,
            availability,
            is_accepting_patients: request.is_accepting_patients.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };

        self.store.insert(DOCTORS, to_row(&doctor)?).await?;

        info!("Doctor profile {} created for user {}", doctor.id, doctor.user_id);
        Ok(doctor)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        self.store
            .select_one(DOCTORS, &Query::new().eq("id", doctor_id))
            .await?
            .map(from_row)
            .transpose()?
            .ok_or(DoctorError::NotFound)
    }

    pub async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Doctor>, DoctorError> {
        self.store
            .select_one(DOCTORS, &Query::new().eq("user_id", user_id))
            .await?
            .map(from_row)
            .transpose()
    }

    pub async fn list_doctors(&self, query: DoctorSearchQuery) -> Result<Vec<Doctor>, DoctorError> {
        let mut select = Query::new().order_by("full_name", true);

        if let Some(specialization) = query.specialization.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.eq("specialization", specialization);
        }
        if query.accepting_only.unwrap_or(false) {
            select = select.eq("is_accepting_patients", true);
        }

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        select = select.limit(limit).offset(query.offset.unwrap_or(0));

        let rows = self.store.select(DOCTORS, &select).await?;
        rows.into_iter().map(from_row).collect()
    }

    pub async fn update_doctor(
        &self,
        actor: &AuthUser,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
    ) -> Result<Doctor, DoctorError> {
        let doctor = self.get_doctor(doctor_id).await?;
        ensure_can_manage(actor, &doctor)?;

        let mut update_data = serde_json::Map::new();

        if let Some(full_name) = request.full_name {
            update_data.insert("full_name".to_string(), json!(required_text("full_name", &full_name)?));
        }
        if let Some(specialization) = request.specialization {
            update_data.insert("specialization".to_string(), json!(required_text("specialization", &specialization)?));
        }
        if let Some(bio) = request.bio {
            validate_bio(&bio)?;
            update_data.insert("bio".to_string(), json!(bio));
        }
        if let Some(slot_minutes) = request.slot_minutes {
            validate_slot_minutes(slot_minutes)?;
            update_data.insert("slot_minutes".to_string(), json!(slot_minutes));
        }
        if let Some(accepting) = request.is_accepting_patients {
            update_data.insert("is_accepting_patients".to_string(), json!(accepting));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self.update_row(doctor_id, Value::Object(update_data)).await?;
        info!("Doctor profile {} updated by {}", doctor_id, actor.id);
        Ok(updated)
    }

    /// Replace the weekly schedule wholesale.
    pub async fn set_availability(
        &self,
        actor: &AuthUser,
        doctor_id: Uuid,
        windows: Vec<AvailabilityWindow>,
    ) -> Result<Doctor, DoctorError> {
        let doctor = self.get_doctor(doctor_id).await?;
        ensure_can_manage(actor, &doctor)?;

        let windows = validate_windows(windows)?;
        let updated = self
            .update_row(doctor_id, json!({ "availability": windows, "updated_at": Utc::now() }))
            .await?;

        info!("Doctor {} now has {} availability windows", doctor_id, updated.availability.len());
        Ok(updated)
    }

    async fn update_row(&self, doctor_id: Uuid, patch: Value) -> Result<Doctor, DoctorError> {
        let rows = self
            .store
            .update(DOCTORS, &Query::new().eq("id", doctor_id), patch)
            .await?;

        rows.into_iter().next().map(from_row).transpose()?.ok_or(DoctorError::NotFound)
    }
}

fn ensure_can_manage(actor: &AuthUser, doctor: &Doctor) -> Result<(), DoctorError> {
    if actor.is_admin() || (actor.is_doctor() && actor.id == doctor.user_id) {
        Ok(())
    } else {
        warn!("User {} denied management of doctor {}", actor.id, doctor.id);
        Err(DoctorError::Forbidden("Not authorized to manage this doctor profile".to_string()))
    }
}

fn required_text(field: &str, value: &str) -> Result<String, DoctorError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DoctorError::ValidationError(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn validate_bio(bio: &str) -> Result<(), DoctorError> {
    if bio.chars().count() > MAX_BIO_LENGTH {
        return Err(DoctorError::ValidationError(format!("bio must be at most {} characters", MAX_BIO_LENGTH)));
    }
    Ok(())
}

fn validate_slot_minutes(minutes: u32) -> Result<(), DoctorError> {
    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&minutes) {
        return Err(DoctorError::ValidationError(format!(
            "slot_minutes must be between {} and {}",
            MIN_SLOT_MINUTES, MAX_SLOT_MINUTES
        )));
    }
    Ok(())
}

fn to_row(doctor: &Doctor) -> Result<Value, DoctorError> {
    serde_json::to_value(doctor).map_err(|e| DoctorError::DatabaseError(format!("Failed to encode doctor: {}", e)))
}

pub(crate) fn from_row(row: Value) -> Result<Doctor, DoctorError> {
    serde_json::from_value(row).map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))
}
