use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::{DoctorError, PublicDoctorProfile};
use schedule_cell::models::{ScheduleError, TimeSlot};
use shared_models::error::{AppError, FieldErrors};
use shared_models::time::hh_mm;

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Date and times of the slot an appointment holds, embedded by the store
/// when listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotSummary {
    pub slot_date: NaiveDate,
    #[serde(with = "hh_mm")]
    pub start_time: NaiveTime,
    #[serde(with = "hh_mm")]
    pub end_time: NaiveTime,
}

impl From<&TimeSlot> for SlotSummary {
    fn from(slot: &TimeSlot) -> Self {
        Self {
            slot_date: slot.slot_date,
            start_time: slot.start_time,
            end_time: slot.end_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_name: String,
    pub patient_phone: String,
    pub patient_email: Option<String>,
    pub patient_notes: Option<String>,
    pub status: AppointmentStatus,
    pub doctor_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "time_slots", skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotSummary>,
}

impl Appointment {
    pub fn slot_date(&self) -> Option<NaiveDate> {
        self.slot.as_ref().map(|slot| slot.slot_date)
    }
}

// ==============================================================================
// REQUESTS AND RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub slot_id: String,
    pub patient_name: String,
    pub patient_phone: String,
    pub patient_email: Option<String>,
    pub patient_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub appointment: Appointment,
    pub doctor: PublicDoctorProfile,
    pub slot: TimeSlot,
}

/// What the public booking page renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingPage {
    pub doctor: PublicDoctorProfile,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    pub doctor_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNotesRequest {
    pub doctor_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentQuery {
    pub status: Option<AppointmentStatus>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub no_show: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub counts: StatusCounts,
    pub today: Vec<Appointment>,
    pub upcoming: Vec<Appointment>,
    pub open_slots: usize,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Time slot not found")]
    SlotNotFound,

    #[error("This time slot is no longer available. Please choose another one.")]
    SlotUnavailable,

    #[error("Cannot change an appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment was changed by another request")]
    StatusChanged,

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error(transparent)]
    Doctor(#[from] DoctorError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for AppointmentError {
    fn from(error: anyhow::Error) -> Self {
        AppointmentError::Database(error.to_string())
    }
}

impl From<FieldErrors> for AppointmentError {
    fn from(errors: FieldErrors) -> Self {
        AppointmentError::Validation(errors)
    }
}

impl From<ScheduleError> for AppointmentError {
    fn from(error: ScheduleError) -> Self {
        match error {
            ScheduleError::SlotNotFound => AppointmentError::SlotNotFound,
            ScheduleError::Validation(fields) => AppointmentError::Validation(fields),
            other => AppointmentError::Database(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::NotFound | AppointmentError::SlotNotFound => {
                AppError::NotFound(error.to_string())
            }
            AppointmentError::SlotUnavailable
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::StatusChanged => AppError::Conflict(error.to_string()),
            AppointmentError::Validation(fields) => AppError::InvalidFields(fields),
            AppointmentError::Doctor(inner) => inner.into(),
            AppointmentError::Database(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn listing_rows_embed_slot_times() {
        let appointment: Appointment = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "slot_id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "patient_name": "Sam Patient",
            "patient_phone": "+1 555 987 6543",
            "patient_email": null,
            "patient_notes": null,
            "status": "no_show",
            "doctor_notes": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": null,
            "time_slots": { "slot_date": "2024-01-03", "start_time": "09:40:00", "end_time": "10:00:00" }
        }))
        .unwrap();

        assert_eq!(appointment.status, AppointmentStatus::NoShow);
        assert_eq!(appointment.slot_date(), NaiveDate::from_ymd_opt(2024, 1, 3));

        let value = serde_json::to_value(&appointment).unwrap();
        assert_eq!(value["slot"]["start_time"], "09:40");
        assert_eq!(value["status"], "no_show");
    }

    #[test]
    fn conflicts_and_transitions_map_to_409() {
        let err: AppError = AppointmentError::SlotUnavailable.into();
        assert_matches!(err, AppError::Conflict(msg) if msg.contains("no longer available"));

        let err: AppError = AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Cancelled,
        }
        .into();
        assert_matches!(err, AppError::Conflict(msg) if msg.contains("completed to cancelled"));
    }
}
