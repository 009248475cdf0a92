use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::TokenResponse;
use shared_models::error::AppError;
use shared_utils::extractor::{extract_bearer_token, AuthContext};

use crate::models::{CallbackRequest, SignInRequest, SignUpRequest};
use crate::services::AuthService;

// ==============================================================================
// SESSION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn sign_up(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let auth_service = AuthService::new(&state);

    let response = auth_service.sign_up(request).await?;

    Ok((StatusCode::CREATED, Json(json!(response))))
}

#[axum::debug_handler]
pub async fn sign_in(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<Value>, AppError> {
    let auth_service = AuthService::new(&state);

    let response = auth_service.sign_in(request).await?;

    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn sign_out(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<StatusCode, AppError> {
    let auth_service = AuthService::new(&state);

    auth_service.sign_out(&ctx.token).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<Arc<AppConfig>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Value>, AppError> {
    let auth_service = AuthService::new(&state);

    let response = auth_service.session(&ctx.user, &ctx.token).await?;

    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn auth_callback(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<CallbackRequest>,
) -> Result<Json<Value>, AppError> {
    let auth_service = AuthService::new(&state);

    let response = auth_service.callback(request).await?;

    Ok(Json(json!(response)))
}

// ==============================================================================
// TOKEN CHECKS
// ==============================================================================

pub async fn validate_token(
    State(state): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let user = AuthService::new(&state).validate(&token)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

pub async fn verify_token(
    State(state): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;
    let valid = AuthService::new(&state).validate(&token).is_ok();

    Ok(Json(json!({ "valid": valid })))
}
