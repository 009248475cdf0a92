use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::extractor::AuthContext;

use crate::models::{CompleteProfileRequest, UpdateDoctorRequest};
use crate::services::doctor::DoctorService;

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_public_profile(
    State(state): State<Arc<AppConfig>>,
    Path(username): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let profile = doctor_service.get_public_profile(&username).await
        .map_err(|e| match e {
            crate::models::DoctorError::NotFound => {
                AppError::NotFound(format!("We couldn't find a practitioner called '{}'", username))
            }
            other => other.into(),
        })?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn check_username(
    State(state): State<Arc<AppConfig>>,
    Path(username): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let available = doctor_service.is_username_available(&username).await?;

    Ok(Json(json!({
        "username": username,
        "available": available
    })))
}

// ==============================================================================
// PROTECTED PROFILE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_my_profile(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service.ensure_profile(&ctx.user, &ctx.token).await?;
    let share_link = doctor_service.share_link(&doctor);

    Ok(Json(json!({
        "doctor": doctor,
        "share_link": share_link
    })))
}

#[axum::debug_handler]
pub async fn update_my_profile(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service.update_profile(ctx.user_id(), request, &ctx.token).await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Profile updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn complete_my_profile(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<CompleteProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service.complete_profile(ctx.user_id(), request, &ctx.token).await?;
    let share_link = doctor_service.share_link(&doctor);

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "share_link": share_link
    })))
}

#[axum::debug_handler]
pub async fn get_share_link(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service.get_profile(ctx.user_id(), &ctx.token).await?;

    Ok(Json(json!(doctor_service.share_link(&doctor))))
}
