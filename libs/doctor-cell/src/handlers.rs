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

use crate::models::{AvailabilityQuery, CreateDoctorRequest, DoctorSearchQuery, SetAvailabilityRequest, UpdateDoctorRequest};
use crate::services::{AvailabilityService, DoctorService};

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(state.store.clone());
    let doctors = service.list_doctors(query).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(state.store.clone());
    let doctor = service.get_doctor(doctor_id).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_day_availability(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    AppQuery(query): AppQuery<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(state.store.clone());
    let availability = service.day_availability(doctor_id, &query.date).await?;

    Ok(Json(json!(availability)))
}

// ==============================================================================
// AUTHENTICATED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(request): AppJson<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = DoctorService::new(state.store.clone());
    let doctor = service.create_doctor(&user, request).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor profile created successfully"
    }))))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(doctor_id): Path<Uuid>,
    AppJson(request): AppJson<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(state.store.clone());
    let doctor = service.update_doctor(&user, doctor_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor profile updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn set_availability(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(doctor_id): Path<Uuid>,
    AppJson(request): AppJson<SetAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(state.store.clone());
    let doctor = service.set_availability(&user, doctor_id, request.windows).await?;

    Ok(Json(json!({
        "success": true,
        "availability": doctor.availability,
        "message": "Availability updated successfully"
    })))
}
