use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn user_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::register_user).get(handlers::list_users))
        .route("/me", get(handlers::get_current_user).put(handlers::update_current_user))
        .route("/{user_id}", get(handlers::get_user))
        .route("/{user_id}/deactivate", post(handlers::deactivate_user))
        .route("/{user_id}/reactivate", post(handlers::reactivate_user))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
