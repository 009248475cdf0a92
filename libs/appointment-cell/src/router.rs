use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Practitioner-side appointment management.
pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_appointments))
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .route("/{appointment_id}/notes", patch(handlers::update_appointment_notes))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Patient-facing booking page, no session required.
pub fn booking_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/{username}", get(handlers::get_booking_page).post(handlers::book_appointment))
        .with_state(state)
}
