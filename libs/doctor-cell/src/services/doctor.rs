use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::{prefer_headers, return_representation, SupabaseClient};
use shared_database::DatabaseError;
use shared_models::auth::User;
use shared_models::error::FieldErrors;
use shared_utils::validation::{non_blank, slugify, validate_phone, validate_username, USERNAME_MAX_LENGTH};

use crate::models::{
    CompleteProfileRequest, Doctor, DoctorError, PublicDoctorProfile, ShareLink,
    UpdateDoctorRequest,
};

const PUBLIC_PROFILE_COLUMNS: &str = "id,username,full_name,specialty,bio";
const MAX_BIO_LENGTH: usize = 1000;

pub struct DoctorService {
    supabase: SupabaseClient,
    admin: SupabaseClient,
    public_base_url: String,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            admin: SupabaseClient::service_role(config),
            public_base_url: config.public_base_url.clone(),
        }
    }

    pub async fn find_doctor(
        &self,
        doctor_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Option<Doctor>, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Doctor> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        Ok(result.into_iter().next())
    }

    pub async fn get_profile(&self, doctor_id: &str, auth_token: &str) -> Result<Doctor, DoctorError> {
        self.find_doctor(doctor_id, Some(auth_token))
            .await?
            .ok_or(DoctorError::NotFound)
    }

    /// Return the caller's profile row, creating it on first access. Safe to
    /// call concurrently and repeatedly for the same principal.
    pub async fn ensure_profile(&self, user: &User, auth_token: &str) -> Result<Doctor, DoctorError> {
        if let Some(doctor) = self.find_doctor(&user.id, Some(auth_token)).await? {
            return Ok(doctor);
        }

        let mut candidates = Vec::new();
        if let Some(requested) = user.requested_username() {
            if validate_username(requested).is_ok() {
                candidates.push(requested.to_string());
            }
        }
        candidates.push(derive_default_username(user.email.as_deref(), &user.id, 6));
        candidates.push(derive_default_username(user.email.as_deref(), &user.id, 12));

        for username in candidates {
            match self.insert_profile_if_missing(&user.id, &username, auth_token).await {
                Ok(Some(doctor)) => {
                    info!("Created profile {} for user {}", doctor.username, user.id);
                    return Ok(doctor);
                }
                // Lost a race with another request for the same principal.
                Ok(None) => {
                    return self.get_profile(&user.id, auth_token).await;
                }
                Err(DoctorError::UsernameTaken) => {
                    warn!("Username {} already taken, trying next candidate", username);
                }
                Err(e) => return Err(e),
            }
        }

        Err(DoctorError::UsernameTaken)
    }

    async fn insert_profile_if_missing(
        &self,
        doctor_id: &str,
        username: &str,
        auth_token: &str,
    ) -> Result<Option<Doctor>, DoctorError> {
        let now = Utc::now().to_rfc3339();
        let doctor_data = json!({
            "id": doctor_id,
            "username": username,
            "tier": "free",
            "profile_completed": false,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Doctor> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctors?on_conflict=id",
            Some(auth_token),
            Some(doctor_data),
            Some(prefer_headers("resolution=ignore-duplicates,return=representation")),
        ).await.map_err(map_username_conflict)?;

        Ok(result.into_iter().next())
    }

    /// Create the profile row for a freshly signed-up principal with exactly
    /// the requested username. Runs with the service role since the new user
    /// may not hold a session yet.
    pub async fn create_profile(&self, doctor_id: &str, username: &str) -> Result<Doctor, DoctorError> {
        debug!("Creating profile {} for {}", username, doctor_id);

        let now = Utc::now().to_rfc3339();
        let doctor_data = json!({
            "id": doctor_id,
            "username": username,
            "tier": "free",
            "profile_completed": false,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Doctor> = self.admin.request_with_headers(
            Method::POST,
            "/rest/v1/doctors",
            None,
            Some(doctor_data),
            Some(return_representation()),
        ).await.map_err(map_username_conflict)?;

        result.into_iter().next().ok_or_else(|| {
            DoctorError::Database("Failed to create doctor profile".to_string())
        })
    }

    pub async fn update_profile(
        &self,
        doctor_id: &str,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor profile: {}", doctor_id);

        let mut errors = FieldErrors::new();
        if let Some(phone) = non_blank(request.phone.as_deref()) {
            if let Err(msg) = validate_phone(&phone) {
                errors.add("phone", msg);
            }
        }
        if let Some(full_name) = request.full_name.as_deref() {
            if full_name.trim().chars().count() < 2 {
                errors.add("full_name", "Full name must be at least 2 characters");
            }
        }
        if request.bio.as_deref().map(|bio| bio.chars().count() > MAX_BIO_LENGTH).unwrap_or(false) {
            errors.add("bio", format!("Bio must be at most {} characters", MAX_BIO_LENGTH));
        }
        errors.into_result()?;

        let mut update_data = serde_json::Map::new();

        if let Some(full_name) = request.full_name {
            update_data.insert("full_name".to_string(), json!(full_name.trim()));
        }
        if let Some(specialty) = request.specialty {
            update_data.insert("specialty".to_string(), json!(non_blank(Some(specialty.as_str()))));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(non_blank(Some(phone.as_str()))));
        }
        if let Some(bio) = request.bio {
            update_data.insert("bio".to_string(), json!(non_blank(Some(bio.as_str()))));
        }

        self.patch_profile(doctor_id, update_data, auth_token).await
    }

    /// Fill the required profile fields and unlock the dashboard.
    pub async fn complete_profile(
        &self,
        doctor_id: &str,
        request: CompleteProfileRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Completing doctor profile: {}", doctor_id);

        let mut errors = FieldErrors::new();
        if request.full_name.trim().chars().count() < 2 {
            errors.add("full_name", "Full name must be at least 2 characters");
        }
        if request.specialty.trim().is_empty() {
            errors.add("specialty", "Specialty is required");
        }
        if let Err(msg) = validate_phone(&request.phone) {
            errors.add("phone", msg);
        }
        if request.bio.as_deref().map(|bio| bio.chars().count() > MAX_BIO_LENGTH).unwrap_or(false) {
            errors.add("bio", format!("Bio must be at most {} characters", MAX_BIO_LENGTH));
        }
        errors.into_result()?;

        let mut update_data = serde_json::Map::new();
        update_data.insert("full_name".to_string(), json!(request.full_name.trim()));
        update_data.insert("specialty".to_string(), json!(request.specialty.trim()));
        update_data.insert("phone".to_string(), json!(request.phone.trim()));
        update_data.insert("bio".to_string(), json!(non_blank(request.bio.as_deref())));
        update_data.insert("profile_completed".to_string(), json!(true));

        let doctor = self.patch_profile(doctor_id, update_data, auth_token).await?;
        info!("Doctor {} completed their profile", doctor.username);
        Ok(doctor)
    }

    async fn patch_profile(
        &self,
        doctor_id: &str,
        mut update_data: serde_json::Map<String, Value>,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Doctor> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(return_representation()),
        ).await?;

        result.into_iter().next().ok_or(DoctorError::NotFound)
    }

    /// Gate for dashboard-only operations.
    pub async fn require_completed_profile(&self, doctor_id: &str, auth_token: &str) -> Result<Doctor, DoctorError> {
        let doctor = self.get_profile(doctor_id, auth_token).await?;
        if !doctor.profile_completed {
            return Err(DoctorError::ProfileIncomplete);
        }
        Ok(doctor)
    }

    /// Public lookup for the booking page. Malformed usernames are reported
    /// as not found rather than as validation errors.
    pub async fn get_public_profile(&self, username: &str) -> Result<PublicDoctorProfile, DoctorError> {
        debug!("Looking up public profile for {}", username);

        if validate_username(username).is_err() {
            return Err(DoctorError::NotFound);
        }

        let path = format!(
            "/rest/v1/doctors?username=eq.{}&select={}",
            urlencoding::encode(username),
            PUBLIC_PROFILE_COLUMNS
        );
        let result: Vec<PublicDoctorProfile> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await?;

        result.into_iter().next().ok_or(DoctorError::NotFound)
    }

    pub async fn is_username_available(&self, username: &str) -> Result<bool, DoctorError> {
        if let Err(msg) = validate_username(username) {
            let mut errors = FieldErrors::new();
            errors.add("username", msg);
            return Err(DoctorError::Validation(errors));
        }

        let path = format!("/rest/v1/doctors?username=eq.{}&select=id", urlencoding::encode(username));
        let result: Vec<Value> = self.admin.request(
            Method::GET,
            &path,
            None,
            None,
        ).await?;

        Ok(result.is_empty())
    }

    pub fn share_link(&self, doctor: &Doctor) -> ShareLink {
        ShareLink {
            username: doctor.username.clone(),
            url: format!("{}/{}", self.public_base_url, doctor.username),
        }
    }
}

fn map_username_conflict(error: anyhow::Error) -> DoctorError {
    if DatabaseError::is_conflict(&error) {
        DoctorError::UsernameTaken
    } else {
        DoctorError::from(error)
    }
}

/// Default username for a principal that never chose one: the email local
/// part reduced to the username alphabet, then a slice of the principal id.
pub fn derive_default_username(email: Option<&str>, user_id: &str, suffix_len: usize) -> String {
    let suffix: String = user_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(suffix_len)
        .collect();

    let seed = email
        .and_then(|email| email.split('@').next())
        .map(slugify)
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| "doctor".to_string());

    let max_base = USERNAME_MAX_LENGTH.saturating_sub(suffix.len() + 1);
    let base: String = seed.chars().take(max_base).collect();
    let base = base.trim_end_matches('-');

    if suffix.is_empty() {
        base.to_string()
    } else {
        format!("{}-{}", base, suffix)
    }
}
