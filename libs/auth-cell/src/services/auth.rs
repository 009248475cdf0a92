use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use doctor_cell::services::DoctorService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_database::DatabaseError;
use shared_models::auth::{AuthSession, User};
use shared_models::error::FieldErrors;
use shared_utils::jwt::validate_token;
use shared_utils::validation::{is_valid_email, validate_password, validate_username};

use crate::models::{
    next_route, AuthError, CallbackRequest, SessionResponse, SignInRequest, SignUpRequest,
    SignUpResponse, SETTINGS_ROUTE,
};

/// Thin layer over the hosted auth provider plus the practitioner-row
/// reconciliation every session goes through.
pub struct AuthService {
    supabase: SupabaseClient,
    admin: SupabaseClient,
    doctors: DoctorService,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            admin: SupabaseClient::service_role(config),
            doctors: DoctorService::new(config),
            jwt_secret: config.supabase_jwt_secret.clone(),
        }
    }

    /// Register a practitioner. The username is checked before the principal
    /// exists; if the profile insert still loses the username, the principal
    /// is deleted again.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpResponse, AuthError> {
        let email = request.email.trim().to_lowercase();
        let username = request.username.trim().to_string();

        let mut errors = FieldErrors::new();
        if !is_valid_email(&email) {
            errors.add("email", "Please enter a valid email address");
        }
        if let Err(msg) = validate_password(&request.password) {
            errors.add("password", msg);
        }
        if let Err(msg) = validate_username(&username) {
            errors.add("username", msg);
        }
        errors.into_result()?;

        if !self.doctors.is_username_available(&username).await? {
            warn!("Sign-up rejected, username {} is taken", username);
            return Err(AuthError::UsernameTaken);
        }

        debug!("Creating auth principal for {}", email);
        let signup_data = json!({
            "email": email,
            "password": request.password,
            "data": {
                "username": username,
                "full_name": request.full_name
            }
        });
        let response: Value = self.supabase
            .request(Method::POST, "/auth/v1/signup", None, Some(signup_data))
            .await
            .map_err(provider_rejection)?;

        // With email confirmation on, the provider returns the bare user.
        let user_id = response
            .pointer("/user/id")
            .or_else(|| response.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AuthError::Provider("Sign-up response carried no user id".to_string()))?;
        let session = serde_json::from_value::<AuthSession>(response).ok();

        let doctor = match self.doctors.create_profile(&user_id, &username).await {
            Ok(doctor) => doctor,
            Err(e) => {
                let e = AuthError::from(e);
                if matches!(e, AuthError::UsernameTaken) {
                    warn!("Username {} was claimed during sign-up, removing principal {}", username, user_id);
                    self.delete_principal(&user_id).await;
                }
                return Err(e);
            }
        };

        info!("Practitioner {} signed up as {}", user_id, doctor.username);

        Ok(SignUpResponse {
            user_id,
            doctor,
            session,
            next: SETTINGS_ROUTE.to_string(),
        })
    }

    pub async fn sign_in(&self, request: SignInRequest) -> Result<SessionResponse, AuthError> {
        let email = request.email.trim().to_lowercase();

        let mut errors = FieldErrors::new();
        if email.is_empty() {
            errors.add("email", "Email is required");
        }
        if request.password.is_empty() {
            errors.add("password", "Password is required");
        }
        errors.into_result()?;

        debug!("Signing in {}", email);
        let session: AuthSession = self.supabase
            .request(
                Method::POST,
                "/auth/v1/token?grant_type=password",
                None,
                Some(json!({ "email": email, "password": request.password })),
            )
            .await
            .map_err(|e| match provider_rejection(e) {
                AuthError::Rejected(_) => AuthError::InvalidCredentials,
                other => other,
            })?;

        self.establish(session.access_token.clone(), Some(session)).await
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.supabase
            .execute(Method::POST, "/auth/v1/logout", Some(access_token), None)
            .await?;
        Ok(())
    }

    /// Current session, reconciling the practitioner row on the way.
    pub async fn session(&self, user: &User, access_token: &str) -> Result<SessionResponse, AuthError> {
        let doctor = self.doctors.ensure_profile(user, access_token).await?;

        Ok(SessionResponse {
            user: user.clone(),
            next: next_route(&doctor).to_string(),
            doctor,
            session: None,
        })
    }

    pub async fn callback(&self, request: CallbackRequest) -> Result<SessionResponse, AuthError> {
        let session = AuthSession {
            access_token: request.access_token.clone(),
            refresh_token: request.refresh_token,
            token_type: Some("bearer".to_string()),
            expires_in: None,
        };
        self.establish(request.access_token, Some(session)).await
    }

    pub fn validate(&self, access_token: &str) -> Result<User, AuthError> {
        validate_token(access_token, &self.jwt_secret).map_err(|e| {
            debug!("Token rejected: {}", e);
            AuthError::InvalidSession
        })
    }

    async fn establish(&self, access_token: String, session: Option<AuthSession>) -> Result<SessionResponse, AuthError> {
        let user = self.validate(&access_token)?;
        let doctor = self.doctors.ensure_profile(&user, &access_token).await?;

        info!("Session established for {}", user.id);

        Ok(SessionResponse {
            user,
            next: next_route(&doctor).to_string(),
            doctor,
            session,
        })
    }

    async fn delete_principal(&self, user_id: &str) {
        let path = format!("/auth/v1/admin/users/{}", user_id);
        if let Err(e) = self.admin.execute(Method::DELETE, &path, None, None).await {
            error!("Failed to remove principal {} after sign-up conflict: {}", user_id, e);
        }
    }
}

/// Client-side rejections from the provider (bad credentials, duplicate
/// email, weak password) keep their message; anything else is upstream.
fn provider_rejection(error: anyhow::Error) -> AuthError {
    match error.downcast_ref::<DatabaseError>() {
        Some(DatabaseError::Api { status, message }) if (400..500).contains(status) => {
            AuthError::Rejected(provider_message(message))
        }
        Some(DatabaseError::Conflict(message)) | Some(DatabaseError::Auth(message)) => {
            AuthError::Rejected(provider_message(message))
        }
        _ => AuthError::Provider(error.to_string()),
    }
}

fn provider_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["msg", "error_description", "message"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| "Request was rejected".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn provider_messages_are_extracted() {
        assert_eq!(provider_message(r#"{"msg":"User already registered"}"#), "User already registered");
        assert_eq!(
            provider_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(provider_message("<html>"), "Request was rejected");
    }

    #[test]
    fn client_errors_become_rejections() {
        let err = anyhow::Error::new(DatabaseError::Api { status: 422, message: r#"{"msg":"Weak password"}"#.to_string() });
        assert_matches!(provider_rejection(err), AuthError::Rejected(msg) if msg == "Weak password");

        let err = anyhow::Error::new(DatabaseError::Api { status: 503, message: "down".to_string() });
        assert_matches!(provider_rejection(err), AuthError::Provider(_));
    }
}
