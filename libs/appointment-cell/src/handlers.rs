use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use schedule_cell::models::AvailabilityQuery;
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::extractor::AuthContext;

use crate::models::{AppointmentError, AppointmentQuery, BookingRequest, UpdateNotesRequest, UpdateStatusRequest};
use crate::services::{AppointmentService, BookingService};

fn practitioner_not_found(username: &str, error: AppointmentError) -> AppError {
    match error {
        AppointmentError::Doctor(DoctorError::NotFound) => {
            AppError::NotFound(format!("We couldn't find a practitioner called '{}'", username))
        }
        other => other.into(),
    }
}

// ==============================================================================
// PUBLIC BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_booking_page(
    State(state): State<Arc<AppConfig>>,
    Path(username): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);

    let page = booking_service
        .booking_page(&username, query.days, query.limit)
        .await
        .map_err(|e| practitioner_not_found(&username, e))?;

    Ok(Json(json!(page)))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(username): Path<String>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let booking_service = BookingService::new(&state);

    let confirmation = booking_service
        .book_appointment(&username, request)
        .await
        .map_err(|e| practitioner_not_found(&username, e))?;

    Ok((StatusCode::CREATED, Json(json!(confirmation))))
}

// ==============================================================================
// PRACTITIONER APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    let appointment_service = AppointmentService::new(&state);

    let appointments = appointment_service
        .list_appointments(ctx.user_id(), &query, &ctx.token)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_dashboard(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Value>, AppError> {
    let appointment_service = AppointmentService::new(&state);

    let summary = appointment_service.dashboard_summary(ctx.user_id(), &ctx.token).await?;

    Ok(Json(json!(summary)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment_service = AppointmentService::new(&state);

    let appointment = appointment_service
        .get_appointment(ctx.user_id(), &appointment_id.to_string(), &ctx.token)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment_service = AppointmentService::new(&state);

    let appointment = appointment_service
        .update_status(ctx.user_id(), &appointment_id.to_string(), request, &ctx.token)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_notes(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateNotesRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment_service = AppointmentService::new(&state);

    let appointment = appointment_service
        .update_notes(ctx.user_id(), &appointment_id.to_string(), request.doctor_notes, &ctx.token)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}
