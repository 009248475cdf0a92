use chrono::{NaiveTime, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};
use shared_models::error::FieldErrors;
use shared_models::time::{format_time, parse_time};

use crate::models::{CreateScheduleRequest, RecurringSchedule, ScheduleError, ALLOWED_INTERVALS};

pub struct ScheduleService {
    supabase: SupabaseClient,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_schedule(
        &self,
        doctor_id: &str,
        request: CreateScheduleRequest,
        auth_token: &str,
    ) -> Result<RecurringSchedule, ScheduleError> {
        debug!("Creating recurring schedule for doctor: {}", doctor_id);

        let schedule = validate_schedule(&request)?;

        let schedule_data = json!({
            "doctor_id": doctor_id,
            "name": schedule.name,
            "weekdays": schedule.weekdays,
            "start_time": format_time(&schedule.start_time),
            "end_time": format_time(&schedule.end_time),
            "interval_minutes": schedule.interval_minutes,
            "is_active": request.is_active.unwrap_or(true),
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<RecurringSchedule> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/recurring_schedules",
            Some(auth_token),
            Some(schedule_data),
            Some(return_representation()),
        ).await?;

        let schedule = result.into_iter().next().ok_or_else(|| {
            ScheduleError::Database("Failed to create schedule".to_string())
        })?;

        info!("Schedule {} created for doctor {}", schedule.id, doctor_id);
        Ok(schedule)
    }

    pub async fn list_schedules(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Vec<RecurringSchedule>, ScheduleError> {
        debug!("Listing schedules for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/recurring_schedules?doctor_id=eq.{}&order=created_at.asc",
            doctor_id
        );
        let schedules: Vec<RecurringSchedule> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(schedules)
    }

    pub async fn active_schedules(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Vec<RecurringSchedule>, ScheduleError> {
        let path = format!(
            "/rest/v1/recurring_schedules?doctor_id=eq.{}&is_active=eq.true",
            doctor_id
        );
        let schedules: Vec<RecurringSchedule> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(schedules)
    }

    /// Removes the template only. Slots it already produced stay in place.
    pub async fn delete_schedule(
        &self,
        doctor_id: &str,
        schedule_id: &str,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        debug!("Deleting schedule {} for doctor {}", schedule_id, doctor_id);

        let path = format!(
            "/rest/v1/recurring_schedules?id=eq.{}&doctor_id=eq.{}",
            schedule_id, doctor_id
        );
        let deleted: Vec<RecurringSchedule> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(return_representation()),
        ).await?;

        if deleted.is_empty() {
            return Err(ScheduleError::ScheduleNotFound);
        }

        info!("Schedule {} deleted", schedule_id);
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
struct ValidSchedule {
    name: String,
    weekdays: Vec<i32>,
    start_time: NaiveTime,
    end_time: NaiveTime,
    interval_minutes: i32,
}

fn validate_schedule(request: &CreateScheduleRequest) -> Result<ValidSchedule, FieldErrors> {
    let mut errors = FieldErrors::new();

    let name = request.name.trim();
    if name.is_empty() {
        errors.add("name", "Schedule name is required");
    }

    let mut weekdays = request.weekdays.clone();
    weekdays.sort_unstable();
    weekdays.dedup();
    if weekdays.is_empty() {
        errors.add("weekdays", "Select at least one day");
    } else if weekdays.iter().any(|day| !(0..=6).contains(day)) {
        errors.add("weekdays", "Days must be between 0 (Sunday) and 6 (Saturday)");
    }

    let start_time = parse_time(request.start_time.trim());
    let end_time = parse_time(request.end_time.trim());
    if start_time.is_err() {
        errors.add("start_time", "Start time must be in HH:MM format");
    }
    if end_time.is_err() {
        errors.add("end_time", "End time must be in HH:MM format");
    }
    if let (Ok(start), Ok(end)) = (start_time, end_time) {
        if start >= end {
            errors.add("end_time", "End time must be after start time");
        }
    }

    if !ALLOWED_INTERVALS.contains(&request.interval_minutes) {
        errors.add("interval_minutes", "Interval must be one of 5, 10, 15, 20, 25 or 30 minutes");
    }

    match (start_time, end_time) {
        (Ok(start_time), Ok(end_time)) if errors.is_empty() => Ok(ValidSchedule {
            name: name.to_string(),
            weekdays,
            start_time,
            end_time,
            interval_minutes: request.interval_minutes,
        }),
        _ => Err(errors),
    }
}
