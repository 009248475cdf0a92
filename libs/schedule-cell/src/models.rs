use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::{AppError, FieldErrors};
use shared_models::time::hh_mm;

pub const ALLOWED_INTERVALS: [i32; 6] = [5, 10, 15, 20, 25, 30];
pub const MAX_DAYS_AHEAD: i64 = 90;
pub const DEFAULT_DAYS_AHEAD: i64 = 30;
pub const AVAILABILITY_WINDOW_DAYS: i64 = 30;

// ==============================================================================
// RECURRING SCHEDULES
// ==============================================================================

/// Weekly template the generator expands into concrete slots.
/// `weekdays` counts from Sunday = 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringSchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub name: String,
    pub weekdays: Vec<i32>,
    #[serde(with = "hh_mm")]
    pub start_time: NaiveTime,
    #[serde(with = "hh_mm")]
    pub end_time: NaiveTime,
    pub interval_minutes: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl RecurringSchedule {
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday().num_days_from_sunday() as i32;
        self.weekdays.contains(&weekday)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub name: String,
    pub weekdays: Vec<i32>,
    pub start_time: String,
    pub end_time: String,
    pub interval_minutes: i32,
    pub is_active: Option<bool>,
}

// ==============================================================================
// TIME SLOTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub slot_date: NaiveDate,
    #[serde(with = "hh_mm")]
    pub start_time: NaiveTime,
    #[serde(with = "hh_mm")]
    pub end_time: NaiveTime,
    pub duration_minutes: i32,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub is_booked: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl TimeSlot {
    pub fn is_bookable(&self, today: NaiveDate) -> bool {
        self.is_available && !self.is_booked && self.slot_date >= today
    }
}

/// A slot the generator wants to exist. Serializes to the insert payload
/// minus `doctor_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedSlot {
    pub slot_date: NaiveDate,
    #[serde(with = "hh_mm")]
    pub start_time: NaiveTime,
    #[serde(with = "hh_mm")]
    pub end_time: NaiveTime,
    pub duration_minutes: i32,
}

/// Natural key of a slot row, used to skip rows that already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct SlotKey {
    pub slot_date: NaiveDate,
    #[serde(with = "hh_mm")]
    pub start_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    pub slot_date: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSlotsRequest {
    #[serde(default = "default_days_ahead")]
    pub days_ahead: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationResult {
    pub created: i64,
    pub days_ahead: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub days: Option<i64>,
    pub limit: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn default_days_ahead() -> i64 {
    DEFAULT_DAYS_AHEAD
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Schedule not found")]
    ScheduleNotFound,

    #[error("Time slot not found")]
    SlotNotFound,

    #[error("This slot has a booking and cannot be deleted")]
    SlotBooked,

    #[error("A slot already exists at this date and time")]
    DuplicateSlot,

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for ScheduleError {
    fn from(error: anyhow::Error) -> Self {
        ScheduleError::Database(error.to_string())
    }
}

impl From<FieldErrors> for ScheduleError {
    fn from(errors: FieldErrors) -> Self {
        ScheduleError::Validation(errors)
    }
}

impl From<ScheduleError> for AppError {
    fn from(error: ScheduleError) -> Self {
        match error {
            ScheduleError::ScheduleNotFound | ScheduleError::SlotNotFound => {
                AppError::NotFound(error.to_string())
            }
            ScheduleError::SlotBooked | ScheduleError::DuplicateSlot => {
                AppError::Conflict(error.to_string())
            }
            ScheduleError::Validation(fields) => AppError::InvalidFields(fields),
            ScheduleError::Database(msg) => AppError::Database(msg),
        }
    }
}

/// Conflicts on slot inserts mean the `(doctor, date, start)` key is taken.
pub fn map_slot_conflict(error: anyhow::Error) -> ScheduleError {
    if DatabaseError::is_conflict(&error) {
        ScheduleError::DuplicateSlot
    } else {
        ScheduleError::from(error)
    }
}
