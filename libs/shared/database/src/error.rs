use serde_json::Value;
use thiserror::Error;

/// Postgres unique_violation, surfaced by PostgREST in the error body.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl DatabaseError {
    /// Classify a non-success response from PostgREST or GoTrue.
    pub fn from_response(status: u16, body: &str) -> Self {
        let code = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| value.get("code").and_then(|code| code.as_str()).map(str::to_string));

        if status == 409 || code.as_deref() == Some(UNIQUE_VIOLATION) {
            return DatabaseError::Conflict(body.to_string());
        }

        match status {
            401 | 403 => DatabaseError::Auth(body.to_string()),
            404 => DatabaseError::NotFound(body.to_string()),
            _ => DatabaseError::Api { status, message: body.to_string() },
        }
    }

    pub fn is_conflict(error: &anyhow::Error) -> bool {
        matches!(error.downcast_ref::<DatabaseError>(), Some(DatabaseError::Conflict(_)))
    }

    pub fn is_not_found(error: &anyhow::Error) -> bool {
        matches!(error.downcast_ref::<DatabaseError>(), Some(DatabaseError::NotFound(_)))
    }
}
