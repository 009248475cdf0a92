use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::{AppError, FieldErrors};

/// A practitioner's profile row. `id` is the auth principal id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub tier: DoctorTier,
    pub profile_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoctorTier {
    #[default]
    Free,
    Pro,
    Premium,
}

/// What the public booking page may show about a practitioner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicDoctorProfile {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub specialty: Option<String>,
    pub bio: Option<String>,
}

impl From<&Doctor> for PublicDoctorProfile {
    fn from(doctor: &Doctor) -> Self {
        Self {
            id: doctor.id,
            username: doctor.username.clone(),
            full_name: doctor.full_name.clone(),
            specialty: doctor.specialty.clone(),
            bio: doctor.bio.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub full_name: Option<String>,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteProfileRequest {
    pub full_name: String,
    pub specialty: String,
    pub phone: String,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLink {
    pub username: String,
    pub url: String,
}

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("Please complete your profile first")]
    ProfileIncomplete,

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for DoctorError {
    fn from(error: anyhow::Error) -> Self {
        if DatabaseError::is_not_found(&error) {
            DoctorError::NotFound
        } else {
            DoctorError::Database(error.to_string())
        }
    }
}

impl From<FieldErrors> for DoctorError {
    fn from(errors: FieldErrors) -> Self {
        DoctorError::Validation(errors)
    }
}

impl From<DoctorError> for AppError {
    fn from(error: DoctorError) -> Self {
        match error {
            DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
            DoctorError::UsernameTaken => AppError::Conflict("Username is already taken".to_string()),
            DoctorError::ProfileIncomplete => AppError::Forbidden("Please complete your profile first".to_string()),
            DoctorError::Validation(fields) => AppError::InvalidFields(fields),
            DoctorError::Database(msg) => AppError::Database(msg),
        }
    }
}
