use serde::{Deserialize, Serialize};
use thiserror::Error;

use doctor_cell::models::{Doctor, DoctorError};
use shared_models::auth::{AuthSession, User};
use shared_models::error::{AppError, FieldErrors};

pub const DASHBOARD_ROUTE: &str = "/dashboard";
pub const SETTINGS_ROUTE: &str = "/settings";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Tokens handed back by the provider after an email link or OAuth redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackRequest {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpResponse {
    pub user_id: String,
    pub doctor: Doctor,
    /// Absent when the provider requires email confirmation first.
    pub session: Option<AuthSession>,
    pub next: String,
}

/// An established session together with the practitioner row and where the
/// client should go next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: User,
    pub doctor: Doctor,
    pub session: Option<AuthSession>,
    pub next: String,
}

pub fn next_route(doctor: &Doctor) -> &'static str {
    if doctor.profile_completed {
        DASHBOARD_ROUTE
    } else {
        SETTINGS_ROUTE
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Doctor(DoctorError),

    #[error("Auth provider error: {0}")]
    Provider(String),
}

impl From<FieldErrors> for AuthError {
    fn from(errors: FieldErrors) -> Self {
        AuthError::Validation(errors)
    }
}

impl From<DoctorError> for AuthError {
    fn from(error: DoctorError) -> Self {
        match error {
            DoctorError::UsernameTaken => AuthError::UsernameTaken,
            other => AuthError::Doctor(other),
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(error: anyhow::Error) -> Self {
        AuthError::Provider(error.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Validation(fields) => AppError::InvalidFields(fields),
            AuthError::UsernameTaken => AppError::Conflict(error.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidSession => AppError::Auth(error.to_string()),
            AuthError::Rejected(msg) => AppError::BadRequest(msg),
            AuthError::Doctor(inner) => inner.into(),
            AuthError::Provider(msg) => AppError::ExternalService(msg),
        }
    }
}
