use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::AppState;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use shared_utils::extractor::{AppJson, AppQuery};

use crate::models::{
    Appointment, AppointmentSearchQuery, BookAppointmentRequest, CancelAppointmentRequest, RescheduleAppointmentRequest,
    SlotCheckQuery,
};
use crate::services::booking::AppointmentBookingService;

// ==============================================================================
// BOOKING AND QUERIES
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(request): AppJson<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = AppointmentBookingService::new(state.store.clone());
    let appointment = service.book_appointment(&user, request).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    }))))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppQuery(query): AppQuery<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(state.store.clone());
    let appointments = service.list_appointments(&user, query).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(state.store.clone());
    let appointment = service.get_appointment(&user, appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn check_slot(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<SlotCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(state.store.clone());
    let result = service.checker().check(query.doctor_id, &query.date, &query.time).await?;

    Ok(Json(json!(result)))
}

// ==============================================================================
// LIFECYCLE TRANSITIONS
// ==============================================================================

fn transitioned(appointment: Appointment, message: &str) -> Json<Value> {
    Json(json!({
        "success": true,
        "appointment": appointment,
        "message": message
    }))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(state.store.clone());
    let appointment = service.confirm_appointment(&user, appointment_id).await?;

    Ok(transitioned(appointment, "Appointment confirmed"))
}

#[axum::debug_handler]
pub async fn start_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(state.store.clone());
    let appointment = service.start_appointment(&user, appointment_id).await?;

    Ok(transitioned(appointment, "Appointment started"))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(state.store.clone());
    let appointment = service.complete_appointment(&user, appointment_id).await?;

    Ok(transitioned(appointment, "Appointment completed"))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(state.store.clone());
    let appointment = service.mark_no_show(&user, appointment_id).await?;

    Ok(transitioned(appointment, "Appointment marked as no-show"))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
    request: Option<AppJson<CancelAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let reason = request.and_then(|AppJson(body)| body.reason);

    let service = AppointmentBookingService::new(state.store.clone());
    let appointment = service.cancel_appointment(&user, appointment_id, reason).await?;

    Ok(transitioned(appointment, "Appointment cancelled"))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
    AppJson(request): AppJson<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(state.store.clone());
    let appointment = service.reschedule_appointment(&user, appointment_id, request).await?;

    Ok(transitioned(appointment, "Appointment rescheduled"))
}
