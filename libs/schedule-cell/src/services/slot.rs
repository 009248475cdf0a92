use chrono::{Duration, NaiveDate, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};
use shared_models::error::FieldErrors;
use shared_models::time::{format_time, minutes_between, parse_date, parse_time, today};

use crate::models::{
    map_slot_conflict, CreateSlotRequest, ScheduleError, SlotQuery, TimeSlot,
    AVAILABILITY_WINDOW_DAYS,
};

pub struct SlotService {
    supabase: SupabaseClient,
    admin: SupabaseClient,
}

impl SlotService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            admin: SupabaseClient::service_role(config),
        }
    }

    /// Add a single ad-hoc slot outside any recurring schedule.
    pub async fn create_slot(
        &self,
        doctor_id: &str,
        request: CreateSlotRequest,
        auth_token: &str,
    ) -> Result<TimeSlot, ScheduleError> {
        debug!("Creating ad-hoc slot for doctor: {}", doctor_id);

        let mut errors = FieldErrors::new();

        let slot_date = parse_date(request.slot_date.trim());
        match slot_date {
            Ok(date) if date < today() => errors.add("slot_date", "Date cannot be in the past"),
            Ok(_) => {}
            Err(_) => errors.add("slot_date", "Date must be in YYYY-MM-DD format"),
        }

        let start_time = parse_time(request.start_time.trim());
        let end_time = parse_time(request.end_time.trim());
        if start_time.is_err() {
            errors.add("start_time", "Start time must be in HH:MM format");
        }
        if end_time.is_err() {
            errors.add("end_time", "End time must be in HH:MM format");
        }

        let (slot_date, start_time, end_time) = match (slot_date, start_time, end_time) {
            (Ok(date), Ok(start), Ok(end)) if minutes_between(start, end) >= 1 && errors.is_empty() => {
                (date, start, end)
            }
            (_, Ok(start), Ok(end)) if start >= end => {
                errors.add("end_time", "End time must be after start time");
                return Err(errors.into());
            }
            (_, Ok(start), Ok(end)) if minutes_between(start, end) < 1 => {
                errors.add("end_time", "Slot must be at least one minute long");
                return Err(errors.into());
            }
            _ => return Err(errors.into()),
        };

        let slot_data = json!({
            "doctor_id": doctor_id,
            "slot_date": slot_date,
            "start_time": format_time(&start_time),
            "end_time": format_time(&end_time),
            "duration_minutes": minutes_between(start_time, end_time),
            "is_available": true,
            "is_booked": false,
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<TimeSlot> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/time_slots",
            Some(auth_token),
            Some(slot_data),
            Some(return_representation()),
        ).await.map_err(map_slot_conflict)?;

        let slot = result.into_iter().next().ok_or_else(|| {
            ScheduleError::Database("Failed to create slot".to_string())
        })?;

        info!("Slot {} created on {} at {}", slot.id, slot.slot_date, format_time(&slot.start_time));
        Ok(slot)
    }

    /// The practitioner's own slots, booked or not, in calendar order.
    pub async fn list_slots(
        &self,
        doctor_id: &str,
        query: &SlotQuery,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, ScheduleError> {
        debug!("Listing slots for doctor: {}", doctor_id);

        let mut path = format!("/rest/v1/time_slots?doctor_id=eq.{}", doctor_id);
        if let Some(from) = query.from {
            path.push_str(&format!("&slot_date=gte.{}", from));
        }
        if let Some(to) = query.to {
            path.push_str(&format!("&slot_date=lte.{}", to));
        }
        path.push_str("&order=slot_date.asc,start_time.asc");

        let slots: Vec<TimeSlot> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(slots)
    }

    pub async fn delete_slot(
        &self,
        doctor_id: &str,
        slot_id: &str,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        debug!("Deleting slot {} for doctor {}", slot_id, doctor_id);

        let slot = self.find_slot(doctor_id, slot_id, Some(auth_token)).await?
            .ok_or(ScheduleError::SlotNotFound)?;

        if slot.is_booked {
            warn!("Refusing to delete booked slot {}", slot_id);
            return Err(ScheduleError::SlotBooked);
        }

        // Filtered on is_booked so a claim landing in between is never lost.
        let path = format!(
            "/rest/v1/time_slots?id=eq.{}&doctor_id=eq.{}&is_booked=eq.false",
            slot_id, doctor_id
        );
        let deleted: Vec<TimeSlot> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(return_representation()),
        ).await?;

        if deleted.is_empty() {
            warn!("Slot {} was booked before it could be deleted", slot_id);
            return Err(ScheduleError::SlotBooked);
        }

        info!("Slot {} deleted", slot_id);
        Ok(())
    }

    /// Public availability: bookable slots from today up to `window_days`
    /// ahead (capped), earliest first.
    pub async fn get_available_slots(
        &self,
        doctor_id: &str,
        window_days: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<TimeSlot>, ScheduleError> {
        let today = today();
        let window = window_days
            .unwrap_or(AVAILABILITY_WINDOW_DAYS)
            .clamp(0, AVAILABILITY_WINDOW_DAYS);
        let last_day = today + Duration::days(window);

        debug!("Fetching available slots for doctor {} until {}", doctor_id, last_day);

        let path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&is_available=eq.true&is_booked=eq.false&slot_date=gte.{}&slot_date=lte.{}&order=slot_date.asc,start_time.asc",
            doctor_id, today, last_day
        );
        let slots: Vec<TimeSlot> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await?;

        Ok(filter_bookable(slots, today, limit))
    }

    pub async fn find_slot(
        &self,
        doctor_id: &str,
        slot_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Option<TimeSlot>, ScheduleError> {
        let path = format!("/rest/v1/time_slots?id=eq.{}&doctor_id=eq.{}", slot_id, doctor_id);
        let client = if auth_token.is_some() { &self.supabase } else { &self.admin };

        let result: Vec<TimeSlot> = client.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        Ok(result.into_iter().next())
    }

    /// Flip `is_booked` from false to true. Only one concurrent caller can
    /// win: the others see zero updated rows and get `None`.
    pub async fn mark_booked(
        &self,
        doctor_id: &str,
        slot_id: &str,
    ) -> Result<Option<TimeSlot>, ScheduleError> {
        let path = format!(
            "/rest/v1/time_slots?id=eq.{}&doctor_id=eq.{}&is_booked=eq.false&is_available=eq.true",
            slot_id, doctor_id
        );
        let updated: Vec<TimeSlot> = self.admin.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(json!({ "is_booked": true })),
            Some(return_representation()),
        ).await?;

        Ok(updated.into_iter().next())
    }

    pub async fn release(&self, slot_id: &str) -> Result<(), ScheduleError> {
        warn!("Releasing claim on slot {}", slot_id);

        let path = format!("/rest/v1/time_slots?id=eq.{}", slot_id);
        self.admin.execute(
            Method::PATCH,
            &path,
            None,
            Some(json!({ "is_booked": false })),
        ).await?;

        Ok(())
    }
}

/// Re-apply the bookable predicate in process; the store filter alone is not
/// trusted to exclude booked or past slots.
pub fn filter_bookable(slots: Vec<TimeSlot>, today: NaiveDate, limit: Option<usize>) -> Vec<TimeSlot> {
    let mut bookable: Vec<TimeSlot> = slots
        .into_iter()
        .filter(|slot| slot.is_bookable(today))
        .collect();
    bookable.sort_by_key(|slot| (slot.slot_date, slot.start_time));
    if let Some(limit) = limit {
        bookable.truncate(limit);
    }
    bookable
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn slot(date: NaiveDate, hour: u32, is_booked: bool) -> TimeSlot {
        TimeSlot {
            id: Uuid::new_v4(),
            doctor_id: Uuid::nil(),
            slot_date: date,
            start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(hour, 30, 0).unwrap(),
            duration_minutes: 30,
            is_available: true,
            is_booked,
            created_at: None,
        }
    }

    #[test]
    fn booked_slots_are_never_returned() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let slots = vec![slot(today, 9, true), slot(today, 10, false)];

        let bookable = filter_bookable(slots, today, None);

        assert_eq!(bookable.len(), 1);
        assert!(!bookable[0].is_booked);
    }

    #[test]
    fn past_slots_are_dropped_and_order_is_by_date_then_time() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let tomorrow = today.succ_opt().unwrap();
        let slots = vec![
            slot(tomorrow, 9, false),
            slot(today.pred_opt().unwrap(), 9, false),
            slot(today, 11, false),
            slot(today, 8, false),
        ];

        let bookable = filter_bookable(slots, today, Some(2));

        assert_eq!(bookable.len(), 2);
        assert_eq!((bookable[0].slot_date, bookable[0].start_time.format("%H").to_string()), (today, "08".to_string()));
        assert_eq!(bookable[1].start_time, NaiveTime::from_hms_opt(11, 0, 0).unwrap());
    }
}
