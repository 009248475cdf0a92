use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::{AppConfig, SlotGenerationMode};
use shared_database::supabase::{prefer_headers, SupabaseClient};
use shared_models::error::FieldErrors;
use shared_models::time::today;

use crate::models::{
    GenerationResult, PlannedSlot, RecurringSchedule, ScheduleError, SlotKey, MAX_DAYS_AHEAD,
};
use crate::services::schedule::ScheduleService;

const GENERATE_RPC: &str = "generate_slots_from_schedules";

pub struct SlotGenerationService {
    supabase: SupabaseClient,
    schedules: ScheduleService,
    mode: SlotGenerationMode,
}

impl SlotGenerationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            schedules: ScheduleService::new(config),
            mode: config.slot_generation_mode,
        }
    }

    /// Materialize slots from the practitioner's active schedules for
    /// `[today, today + days_ahead)`. Returns how many rows were created;
    /// existing slots, booked or not, are left alone.
    pub async fn generate_slots(
        &self,
        doctor_id: &str,
        days_ahead: i64,
        auth_token: &str,
    ) -> Result<GenerationResult, ScheduleError> {
        if !(1..=MAX_DAYS_AHEAD).contains(&days_ahead) {
            let mut errors = FieldErrors::new();
            errors.add("days_ahead", format!("Days ahead must be between 1 and {}", MAX_DAYS_AHEAD));
            return Err(errors.into());
        }

        let created = match self.mode {
            SlotGenerationMode::App => self.generate_in_app(doctor_id, days_ahead, today(), auth_token).await?,
            SlotGenerationMode::Store => self.generate_in_store(doctor_id, days_ahead, auth_token).await?,
        };

        info!("Generated {} slots for doctor {} over {} days", created, doctor_id, days_ahead);

        Ok(GenerationResult { created, days_ahead })
    }

    async fn generate_in_app(
        &self,
        doctor_id: &str,
        days_ahead: i64,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<i64, ScheduleError> {
        let schedules = self.schedules.active_schedules(doctor_id, auth_token).await?;
        if schedules.is_empty() {
            debug!("Doctor {} has no active schedules", doctor_id);
            return Ok(0);
        }

        let existing = self.existing_keys(doctor_id, today, days_ahead, auth_token).await?;
        let missing: Vec<Value> = plan_slots(&schedules, today, days_ahead)
            .into_iter()
            .filter(|slot| !existing.contains(&SlotKey { slot_date: slot.slot_date, start_time: slot.start_time }))
            .map(|slot| {
                let mut row = json!(slot);
                row["doctor_id"] = json!(doctor_id);
                row["is_available"] = json!(true);
                row["is_booked"] = json!(false);
                row
            })
            .collect();

        if missing.is_empty() {
            return Ok(0);
        }

        debug!("Inserting {} planned slots for doctor {}", missing.len(), doctor_id);

        // One statement; rows raced in by a concurrent run are skipped, not overwritten.
        let inserted: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/time_slots?on_conflict=doctor_id,slot_date,start_time",
            Some(auth_token),
            Some(Value::Array(missing)),
            Some(prefer_headers("resolution=ignore-duplicates,return=representation")),
        ).await?;

        Ok(inserted.len() as i64)
    }

    async fn generate_in_store(
        &self,
        doctor_id: &str,
        days_ahead: i64,
        auth_token: &str,
    ) -> Result<i64, ScheduleError> {
        debug!("Delegating slot generation for doctor {} to the store", doctor_id);

        let created: i64 = self.supabase.rpc(
            GENERATE_RPC,
            json!({ "doctor_uuid": doctor_id, "days_ahead": days_ahead }),
            Some(auth_token),
        ).await?;

        Ok(created)
    }

    async fn existing_keys(
        &self,
        doctor_id: &str,
        today: NaiveDate,
        days_ahead: i64,
        auth_token: &str,
    ) -> Result<HashSet<SlotKey>, ScheduleError> {
        let path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&slot_date=gte.{}&slot_date=lt.{}&select=slot_date,start_time",
            doctor_id,
            today,
            today + Duration::days(days_ahead)
        );
        let keys: Vec<SlotKey> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(keys.into_iter().collect())
    }
}

/// Expand schedules into the slots they describe over
/// `[today, today + days_ahead)`. Each slot is exactly one interval long and
/// a trailing partial interval is dropped. When schedules overlap, the first
/// one to claim a `(date, start)` wins. Output is ordered by date, then start.
pub fn plan_slots(schedules: &[RecurringSchedule], today: NaiveDate, days_ahead: i64) -> Vec<PlannedSlot> {
    let mut planned: BTreeMap<(NaiveDate, NaiveTime), PlannedSlot> = BTreeMap::new();

    for offset in 0..days_ahead.max(0) {
        let date = today + Duration::days(offset);

        for schedule in schedules.iter().filter(|s| s.is_active && s.runs_on(date)) {
            let interval = schedule.interval_minutes;
            if interval <= 0 {
                continue;
            }

            let end = minute_of_day(schedule.end_time);
            let mut start = minute_of_day(schedule.start_time);

            while start + interval <= end {
                if let (Some(start_time), Some(end_time)) = (time_at(start), time_at(start + interval)) {
                    planned.entry((date, start_time)).or_insert(PlannedSlot {
                        slot_date: date,
                        start_time,
                        end_time,
                        duration_minutes: interval,
                    });
                }
                start += interval;
            }
        }
    }

    planned.into_values().collect()
}

fn minute_of_day(time: NaiveTime) -> i32 {
    (time.num_seconds_from_midnight() / 60) as i32
}

fn time_at(minute: i32) -> Option<NaiveTime> {
    NaiveTime::from_num_seconds_from_midnight_opt(u32::try_from(minute).ok()? * 60, 0)
}
