use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use appointment_cell::router::appointment_routes;
use doctor_cell::router::doctor_routes;
use notification_cell::router::notification_routes;
use shared_database::AppState;
use user_cell::router::user_routes;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/users", user_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/notifications", notification_routes(state.clone()));

    Router::new()
        .route("/", get(|| async { "Clinic Booking API is running!" }))
        .route("/health", get(health))
        .nest("/api/v1", api)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "clinic-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
