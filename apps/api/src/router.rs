use std::sync::Arc;

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use appointment_cell::router::{appointment_routes, booking_routes};
use auth_cell::router::auth_routes;
use doctor_cell::router::doctor_routes;
use schedule_cell::router::schedule_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Booking API is running!" }))
        .route("/health", get(health))
        .with_state(state.clone())
        .nest("/auth", auth_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/schedules", schedule_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/book", booking_routes(state))
}

async fn health(State(state): State<Arc<AppConfig>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "configured": state.is_configured(),
    }))
}
