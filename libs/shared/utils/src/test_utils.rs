use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use chrono::{Duration, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, SlotGenerationMode};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub service_role_key: String,
    pub public_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            service_role_key: "test-service-role-key".to_string(),
            public_base_url: "https://book.example.com".to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing at a mock store, typically `MockServer::uri()`.
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_service_role_key: self.service_role_key.clone(),
            public_base_url: self.public_base_url.clone(),
            port: 3000,
            slot_generation_mode: SlotGenerationMode::App,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub username: Option<String>,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "authenticated".to_string(),
            username: None,
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
            username: None,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "authenticated")
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: self.username.as_ref().map(|username| json!({ "username": username })),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let mut payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "aud": "authenticated",
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });
        if let Some(username) = &user.username {
            payload["user_metadata"] = json!({ "username": username });
        }

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row shapes as PostgREST returns them.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_response(doctor_id: &str, username: &str, profile_completed: bool) -> Value {
        let (full_name, specialty, phone) = if profile_completed {
            (Some("Dr. Ana Lopez"), Some("Physiotherapy"), Some("+1 555 123 4567"))
        } else {
            (None, None, None)
        };

        json!({
            "id": doctor_id,
            "username": username,
            "full_name": full_name,
            "specialty": specialty,
            "phone": phone,
            "bio": null,
            "tier": "free",
            "profile_completed": profile_completed,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn schedule_response(schedule_id: &str, doctor_id: &str, weekdays: &[i32], start: &str, end: &str, interval: i32) -> Value {
        json!({
            "id": schedule_id,
            "doctor_id": doctor_id,
            "name": "Clinic hours",
            "weekdays": weekdays,
            "start_time": format!("{}:00", start),
            "end_time": format!("{}:00", end),
            "interval_minutes": interval,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn slot_response(slot_id: &str, doctor_id: &str, date: NaiveDate, start: &str, end: &str, is_booked: bool) -> Value {
        json!({
            "id": slot_id,
            "doctor_id": doctor_id,
            "slot_date": date.format("%Y-%m-%d").to_string(),
            "start_time": format!("{}:00", start),
            "end_time": format!("{}:00", end),
            "duration_minutes": 20,
            "is_available": true,
            "is_booked": is_booked,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(appointment_id: &str, slot_id: &str, doctor_id: &str, status: &str) -> Value {
        json!({
            "id": appointment_id,
            "slot_id": slot_id,
            "doctor_id": doctor_id,
            "patient_name": "Sam Patient",
            "patient_phone": "+1 555 987 6543",
            "patient_email": "sam@example.com",
            "patient_notes": null,
            "status": status,
            "doctor_notes": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn unique_violation(constraint: &str) -> Value {
        json!({
            "code": "23505",
            "details": null,
            "hint": null,
            "message": format!("duplicate key value violates unique constraint \"{}\"", constraint)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::with_supabase_url("http://127.0.0.1:9999");
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://127.0.0.1:9999");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(app_config.has_service_role());
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com").with_username("dr-doc");
        let user_model = user.to_user();

        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.id, user.id);
        assert_eq!(user_model.requested_username(), Some("dr-doc"));
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
