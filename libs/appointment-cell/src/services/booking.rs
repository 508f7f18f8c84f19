use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::{Doctor, DoctorService};
use notification_cell::{CreateNotificationRequest, NotificationDispatcher, NotificationService, NotificationType};
use shared_database::{schema::APPOINTMENTS, DataStore, Query};
use shared_models::auth::{AuthUser, Role};
use shared_models::schedule::{format_date, format_time, is_in_future, parse_date, parse_time};
use user_cell::UserService;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus, BookAppointmentRequest,
    RescheduleAppointmentRequest,
};
use crate::services::availability::SlotAvailabilityChecker;
use crate::services::lifecycle::AppointmentLifecycleService;

const MAX_REASON_LENGTH: usize = 500;
const MAX_NOTES_LENGTH: usize = 2000;
const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

pub struct AppointmentBookingService {
    store: Arc<dyn DataStore>,
    checker: SlotAvailabilityChecker,
    lifecycle: AppointmentLifecycleService,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        let notifier = Arc::new(NotificationService::new(store.clone()));
        Self::with_notifier(store, notifier)
    }

    pub fn with_notifier(store: Arc<dyn DataStore>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            checker: SlotAvailabilityChecker::new(store.clone()),
            lifecycle: AppointmentLifecycleService::new(),
            store,
            notifier,
        }
    }

    pub fn checker(&self) -> &SlotAvailabilityChecker {
        &self.checker
    }

    /// Book a new appointment in status `scheduled`.
    pub async fn book_appointment(
        &self,
        actor: &AuthUser,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Booking appointment with doctor {} for actor {}", request.doctor_id, actor.id);

        let patient_id = match actor.role {
            Role::Patient => {
                if request.patient_id.as_deref().is_some_and(|id| id != actor.id) {
                    return Err(AppointmentError::Unauthorized);
                }
                actor.id.clone()
            }
            Role::Doctor | Role::Admin => request
                .patient_id
                .clone()
                .ok_or_else(|| AppointmentError::ValidationError("patient_id is required".to_string()))?,
        };

        UserService::new(self.store.clone())
            .get_active_user_with_role(&patient_id, Role::Patient)
            .await?;

        let doctor = DoctorService::new(self.store.clone()).get_doctor(request.doctor_id).await?;
        if !doctor.is_accepting_patients {
            warn!("Doctor {} is not accepting patients", doctor.id);
            return Err(AppointmentError::DoctorNotAccepting);
        }

        let reason = validate_reason(&request.reason)?;
        if let Some(notes) = &request.notes {
            validate_notes(notes)?;
        }

        let (date, time) = parse_slot(&request.date, &request.time)?;
        self.validate_slot(&doctor, date, time, None).await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id: doctor.id,
            date,
            time,
            status: AppointmentStatus::Scheduled,
            reason,
            notes: request.notes,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        // a concurrent booking that passed the check fails here on the slot index
        self.store.insert(APPOINTMENTS, to_row(&appointment)?).await?;

        info!("Appointment {} booked with doctor {} on {} at {}",
              appointment.id, doctor.id, appointment.date, format_time(appointment.time));

        let recipients = [appointment.patient_id.clone(), doctor.user_id.clone()];
        self.notify(
            &recipients,
            NotificationType::AppointmentBooked,
            "Appointment booked",
            format!(
                "Appointment with {} on {} at {} is booked",
                doctor.full_name,
                appointment.date,
                format_time(appointment.time)
            ),
            appointment.id,
        )
        .await;

        Ok(appointment)
    }

    pub async fn get_appointment(&self, actor: &AuthUser, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let (appointment, doctor) = self.load_with_doctor(appointment_id).await?;
        ensure_participant(actor, &appointment, &doctor)?;
        Ok(appointment)
    }

    /// Patients only ever see their own appointments and doctors the ones
    /// booked with them; the query's filters narrow that further.
    pub async fn list_appointments(
        &self,
        actor: &AuthUser,
        query: AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut select = Query::new();

        match actor.role {
            Role::Patient => select = select.eq("patient_id", &actor.id),
            Role::Doctor => {
                let Some(profile) = DoctorService::new(self.store.clone()).find_by_user_id(&actor.id).await? else {
                    debug!("Doctor {} has no profile yet", actor.id);
                    return Ok(vec![]);
                };
                select = select.eq("doctor_id", profile.id);
            }
            Role::Admin => {}
        }

        if let Some(status) = query.status {
            select = select.eq("status", status.as_str());
        }
        if let Some(doctor_id) = query.doctor_id {
            select = select.eq("doctor_id", doctor_id);
        }
        if let Some(patient_id) = &query.patient_id {
            select = select.eq("patient_id", patient_id);
        }
        if let Some(from) = &query.from_date {
            let from = parse_date(from).map_err(AppointmentError::ValidationError)?;
            select = select.gte("date", format_date(from));
        }
        if let Some(to) = &query.to_date {
            let to = parse_date(to).map_err(AppointmentError::ValidationError)?;
            select = select.lte("date", format_date(to));
        }

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        select = select
            .order_by("date", true)
            .order_by("time", true)
            .limit(limit)
            .offset(query.offset.unwrap_or(0));

        let rows = self.store.select(APPOINTMENTS, &select).await?;
        rows.into_iter().map(from_row).collect()
    }

    pub async fn confirm_appointment(&self, actor: &AuthUser, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let (appointment, doctor) = self.load_with_doctor(appointment_id).await?;
        ensure_clinician(actor, &doctor)?;

        let updated = self.transition(&appointment, AppointmentStatus::Confirmed, json!({})).await?;

        self.notify(
            &other_participants(actor, &updated, &doctor),
            NotificationType::AppointmentConfirmed,
            "Appointment confirmed",
            format!("Your appointment on {} at {} is confirmed", updated.date, format_time(updated.time)),
            updated.id,
        )
        .await;

        Ok(updated)
    }

    pub async fn start_appointment(&self, actor: &AuthUser, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let (appointment, doctor) = self.load_with_doctor(appointment_id).await?;
        ensure_clinician(actor, &doctor)?;

        self.transition(&appointment, AppointmentStatus::InProgress, json!({})).await
    }

    pub async fn complete_appointment(&self, actor: &AuthUser, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let (appointment, doctor) = self.load_with_doctor(appointment_id).await?;
        ensure_clinician(actor, &doctor)?;

        let updated = self.transition(&appointment, AppointmentStatus::Completed, json!({})).await?;

        self.notify(
            &other_participants(actor, &updated, &doctor),
            NotificationType::AppointmentCompleted,
            "Appointment completed",
            format!("Your appointment on {} with {} is complete", updated.date, doctor.full_name),
            updated.id,
        )
        .await;

        Ok(updated)
    }

    pub async fn mark_no_show(&self, actor: &AuthUser, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let (appointment, doctor) = self.load_with_doctor(appointment_id).await?;
        ensure_clinician(actor, &doctor)?;

        let updated = self.transition(&appointment, AppointmentStatus::NoShow, json!({})).await?;

        self.notify(
            &other_participants(actor, &updated, &doctor),
            NotificationType::AppointmentNoShow,
            "Missed appointment",
            format!("You were marked absent for the appointment on {} at {}", updated.date, format_time(updated.time)),
            updated.id,
        )
        .await;

        Ok(updated)
    }

    /// Cancelling frees the slot for another booking.
    pub async fn cancel_appointment(
        &self,
        actor: &AuthUser,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let (appointment, doctor) = self.load_with_doctor(appointment_id).await?;
        ensure_participant(actor, &appointment, &doctor)?;

        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        if let Some(reason) = &reason {
            validate_notes(reason)?;
        }

        let updated = self
            .transition(&appointment, AppointmentStatus::Cancelled, json!({ "cancellation_reason": reason }))
            .await?;

        let message = match &updated.cancellation_reason {
            Some(reason) => format!(
                "The appointment on {} at {} was cancelled: {}",
                updated.date,
                format_time(updated.time),
                reason
            ),
            None => format!("The appointment on {} at {} was cancelled", updated.date, format_time(updated.time)),
        };
        self.notify(
            &other_participants(actor, &updated, &doctor),
            NotificationType::AppointmentCancelled,
            "Appointment cancelled",
            message,
            updated.id,
        )
        .await;

        Ok(updated)
    }

    /// Move an appointment that has not started to another slot. The new slot
    /// is validated like a booking and the status returns to `scheduled`.
    pub async fn reschedule_appointment(
        &self,
        actor: &AuthUser,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let (appointment, doctor) = self.load_with_doctor(appointment_id).await?;
        ensure_participant(actor, &appointment, &doctor)?;
        self.lifecycle.can_reschedule(appointment.status)?;

        let (date, time) = parse_slot(&request.date, &request.time)?;
        self.validate_slot(&doctor, date, time, Some(appointment.id)).await?;

        let patch = json!({
            "date": format_date(date),
            "time": format_time(time),
            "status": AppointmentStatus::Scheduled,
            "updated_at": Utc::now(),
        });
        let updated = self.compare_and_set(&appointment, AppointmentStatus::Scheduled, patch).await?;

        info!("Appointment {} moved from {} {} to {} {}",
              updated.id, appointment.date, format_time(appointment.time), updated.date, format_time(updated.time));

        self.notify(
            &other_participants(actor, &updated, &doctor),
            NotificationType::AppointmentRescheduled,
            "Appointment rescheduled",
            format!(
                "The appointment on {} at {} moved to {} at {}",
                appointment.date,
                format_time(appointment.time),
                updated.date,
                format_time(updated.time)
            ),
            updated.id,
        )
        .await;

        Ok(updated)
    }

    async fn validate_slot(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        if !is_in_future(date, time) {
            return Err(AppointmentError::InvalidTime(format!(
                "{} {} is not in the future",
                date,
                format_time(time)
            )));
        }

        if !doctor.offers_slot(date, time) {
            return Err(AppointmentError::InvalidTime(format!(
                "{} {} is not one of the doctor's slots",
                date,
                format_time(time)
            )));
        }

        if !self.checker.is_slot_free(doctor.id, date, time, exclude).await? {
            return Err(AppointmentError::SlotNotAvailable);
        }

        Ok(())
    }

    async fn transition(
        &self,
        appointment: &Appointment,
        new_status: AppointmentStatus,
        extra: Value,
    ) -> Result<Appointment, AppointmentError> {
        self.lifecycle.validate_status_transition(appointment.status, new_status)?;

        let mut patch = match extra {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        patch.insert("status".to_string(), json!(new_status));
        patch.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self.compare_and_set(appointment, new_status, Value::Object(patch)).await?;
        info!("Appointment {} moved {} -> {}", updated.id, appointment.status, updated.status);
        Ok(updated)
    }

    /// Applies `patch` only while the stored status is still the one the
    /// caller validated against.
    async fn compare_and_set(
        &self,
        appointment: &Appointment,
        target: AppointmentStatus,
        patch: Value,
    ) -> Result<Appointment, AppointmentError> {
        let query = Query::new()
            .eq("id", appointment.id)
            .eq("status", appointment.status.as_str());

        let rows = self.store.update(APPOINTMENTS, &query, patch).await?;
        if let Some(row) = rows.into_iter().next() {
            return from_row(row);
        }

        let current = self.load(appointment.id).await?;
        warn!("Appointment {} changed concurrently to {}", appointment.id, current.status);
        Err(AppointmentError::InvalidStatusTransition { from: current.status, to: target })
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .select_one(APPOINTMENTS, &Query::new().eq("id", appointment_id))
            .await?
            .map(from_row)
            .transpose()?
            .ok_or(AppointmentError::NotFound)
    }

    async fn load_with_doctor(&self, appointment_id: Uuid) -> Result<(Appointment, Doctor), AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        let doctor = DoctorService::new(self.store.clone()).get_doctor(appointment.doctor_id).await?;
        Ok((appointment, doctor))
    }

    /// Notification failures are logged and never undo the operation.
    async fn notify(
        &self,
        recipients: &[String],
        notification_type: NotificationType,
        title: &str,
        message: String,
        appointment_id: Uuid,
    ) {
        for user_id in recipients {
            let request = CreateNotificationRequest {
                user_id: user_id.clone(),
                notification_type,
                priority: None,
                title: title.to_string(),
                message: message.clone(),
                reference_id: Some(appointment_id),
            };

            if let Err(e) = self.notifier.dispatch(request).await {
                warn!("Failed to send {} notification to {}: {}", notification_type, user_id, e);
            }
        }
    }
}

fn ensure_participant(actor: &AuthUser, appointment: &Appointment, doctor: &Doctor) -> Result<(), AppointmentError> {
    let allowed = match actor.role {
        Role::Admin => true,
        Role::Patient => appointment.patient_id == actor.id,
        Role::Doctor => doctor.user_id == actor.id,
    };

    if allowed {
        Ok(())
    } else {
        warn!("User {} denied access to appointment {}", actor.id, appointment.id);
        Err(AppointmentError::Unauthorized)
    }
}

fn ensure_clinician(actor: &AuthUser, doctor: &Doctor) -> Result<(), AppointmentError> {
    if actor.is_admin() || (actor.is_doctor() && doctor.user_id == actor.id) {
        Ok(())
    } else {
        warn!("User {} may not manage appointments of doctor {}", actor.id, doctor.id);
        Err(AppointmentError::Unauthorized)
    }
}

fn other_participants(actor: &AuthUser, appointment: &Appointment, doctor: &Doctor) -> Vec<String> {
    [&appointment.patient_id, &doctor.user_id]
        .into_iter()
        .filter(|id| **id != actor.id)
        .cloned()
        .collect()
}

fn parse_slot(date: &str, time: &str) -> Result<(NaiveDate, NaiveTime), AppointmentError> {
    let date = parse_date(date).map_err(AppointmentError::ValidationError)?;
    let time = parse_time(time).map_err(AppointmentError::ValidationError)?;
    Ok((date, time))
}

fn validate_reason(reason: &str) -> Result<String, AppointmentError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(AppointmentError::ValidationError("reason must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_REASON_LENGTH {
        return Err(AppointmentError::ValidationError(format!(
            "reason must be at most {} characters",
            MAX_REASON_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_notes(notes: &str) -> Result<(), AppointmentError> {
    if notes.chars().count() > MAX_NOTES_LENGTH {
        return Err(AppointmentError::ValidationError(format!(
            "notes must be at most {} characters",
            MAX_NOTES_LENGTH
        )));
    }
    Ok(())
}

fn to_row(appointment: &Appointment) -> Result<Value, AppointmentError> {
    serde_json::to_value(appointment)
        .map_err(|e| AppointmentError::DatabaseError(format!("Failed to encode appointment: {}", e)))
}

fn from_row(row: Value) -> Result<Appointment, AppointmentError> {
    serde_json::from_value(row)
        .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
}
