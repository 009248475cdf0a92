use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::extractor::AuthContext;

use crate::models::{CreateScheduleRequest, CreateSlotRequest, GenerateSlotsRequest, SlotQuery};
use crate::services::{ScheduleService, SlotGenerationService, SlotService};

// ==============================================================================
// RECURRING SCHEDULES
// ==============================================================================

#[axum::debug_handler]
pub async fn list_schedules(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Value>, AppError> {
    let schedule_service = ScheduleService::new(&state);

    let schedules = schedule_service.list_schedules(ctx.user_id(), &ctx.token).await?;

    Ok(Json(json!({
        "schedules": schedules,
        "total": schedules.len()
    })))
}

#[axum::debug_handler]
pub async fn create_schedule(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let schedule_service = ScheduleService::new(&state);

    let schedule = schedule_service.create_schedule(ctx.user_id(), request, &ctx.token).await?;

    Ok((StatusCode::CREATED, Json(json!(schedule))))
}

#[axum::debug_handler]
pub async fn delete_schedule(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
    Path(schedule_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let schedule_service = ScheduleService::new(&state);

    schedule_service.delete_schedule(ctx.user_id(), &schedule_id.to_string(), &ctx.token).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// TIME SLOTS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_slots(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let slot_service = SlotService::new(&state);

    let slots = slot_service.list_slots(ctx.user_id(), &query, &ctx.token).await?;

    Ok(Json(json!({
        "slots": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn create_slot(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let slot_service = SlotService::new(&state);

    let slot = slot_service.create_slot(ctx.user_id(), request, &ctx.token).await?;

    Ok((StatusCode::CREATED, Json(json!(slot))))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
    Path(slot_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let slot_service = SlotService::new(&state);

    slot_service.delete_slot(ctx.user_id(), &slot_id.to_string(), &ctx.token).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn generate_slots(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<GenerateSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    let generation_service = SlotGenerationService::new(&state);

    let result = generation_service
        .generate_slots(ctx.user_id(), request.days_ahead, &ctx.token)
        .await?;

    Ok(Json(json!(result)))
}
