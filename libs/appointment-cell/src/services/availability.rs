use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::DoctorService;
use shared_database::{schema::APPOINTMENTS, DataStore, Query};
use shared_models::schedule::{format_date, format_time, parse_date, parse_time};

use crate::models::{AppointmentError, AppointmentStatus, SlotCheckResponse};

/// Answers whether a doctor's slot is still free. The check alone is not
/// atomic; the store's active-slot index rejects a racing second insert.
pub struct SlotAvailabilityChecker {
    store: Arc<dyn DataStore>,
}

impl SlotAvailabilityChecker {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Parses the raw slot, confirms the doctor exists and reports whether
    /// the slot is free.
    pub async fn check(&self, doctor_id: Uuid, date: &str, time: &str) -> Result<SlotCheckResponse, AppointmentError> {
        let date = parse_date(date).map_err(AppointmentError::ValidationError)?;
        let time = parse_time(time).map_err(AppointmentError::ValidationError)?;

        DoctorService::new(self.store.clone()).get_doctor(doctor_id).await?;

        let available = self.is_slot_free(doctor_id, date, time, None).await?;

        Ok(SlotCheckResponse { doctor_id, date, time, available })
    }

    /// `exclude` skips one appointment, so a reschedule does not collide with
    /// the slot it is leaving.
    pub async fn is_slot_free(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .eq("date", format_date(date))
            .eq("time", format_time(time))
            .neq("status", AppointmentStatus::Cancelled.as_str());

        let rows = self.store.select(APPOINTMENTS, &query).await?;

        let exclude = exclude.map(|id| id.to_string());
        let conflicts = rows
            .iter()
            .filter(|row| row.get("id").and_then(Value::as_str) != exclude.as_deref())
            .count();

        if conflicts > 0 {
            warn!("Slot {} {} for doctor {} is taken", date, format_time(time), doctor_id);
            return Ok(false);
        }

        debug!("Slot {} {} for doctor {} is free", date, format_time(time), doctor_id);
        Ok(true)
    }
}
