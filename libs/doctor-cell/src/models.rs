use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::schedule::{day_of_week, hhmm};

use crate::services::availability::generate_slots;

pub const DEFAULT_SLOT_MINUTES: u32 = 30;
pub const MIN_SLOT_MINUTES: u32 = 5;
pub const MAX_SLOT_MINUTES: u32 = 240;

/// Recurring weekly working window. `end_time` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub day_of_week: i32, // 0 = Sunday, 1 = Monday, etc.
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: String,
    pub full_name: String,
    pub specialization: String,
    pub license_number: String,
    pub bio: Option<String>,
    pub slot_minutes: u32,
    #[serde(default)]
    pub availability: Vec<AvailabilityWindow>,
    pub is_accepting_patients: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn windows_on(&self, date: NaiveDate) -> impl Iterator<Item = &AvailabilityWindow> {
        let day = day_of_week(date);
        self.availability.iter().filter(move |w| w.day_of_week == day)
    }

    /// A doctor without any configured windows takes bookings at any time;
    /// otherwise `time` has to be one of the slot starts listed for that day.
    pub fn offers_slot(&self, date: NaiveDate, time: NaiveTime) -> bool {
        if self.availability.is_empty() {
            return true;
        }
        let windows: Vec<AvailabilityWindow> = self.windows_on(date).copied().collect();
        generate_slots(&windows, self.slot_minutes).contains(&time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    /// Required when an administrator creates the profile; doctors always
    /// create their own.
    pub user_id: Option<String>,
    pub specialization: String,
    pub license_number: String,
    pub bio: Option<String>,
    pub slot_minutes: Option<u32>,
    pub is_accepting_patients: Option<bool>,
    pub availability: Option<Vec<AvailabilityWindow>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub full_name: Option<String>,
    pub specialization: Option<String>,
    pub bio: Option<String>,
    pub slot_minutes: Option<u32>,
    pub is_accepting_patients: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAvailabilityRequest {
    pub windows: Vec<AvailabilityWindow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorSearchQuery {
    pub specialization: Option<String>,
    pub accepting_only: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySlot {
    pub time: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub doctor_id: Uuid,
    pub date: String,
    pub slot_minutes: u32,
    pub slots: Vec<DaySlot>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("No active doctor account exists for user {0}")]
    UserNotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for DoctorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(key) => {
                DoctorError::AlreadyExists(format!("Doctor profile conflicts with an existing one: {}", key))
            }
            other => DoctorError::DatabaseError(other.to_string()),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound | DoctorError::UserNotFound(_) => AppError::NotFound(err.to_string()),
            DoctorError::AlreadyExists(msg) => AppError::Conflict(msg),
            DoctorError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            DoctorError::Forbidden(msg) => AppError::Forbidden(msg),
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
