use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use doctor_cell::services::DoctorService;
use schedule_cell::services::SlotService;
use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};
use shared_models::error::FieldErrors;
use shared_models::time::today;
use shared_utils::validation::non_blank;

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, DashboardSummary,
    StatusCounts, UpdateStatusRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;

const WITH_SLOT: &str = "select=*,time_slots(slot_date,start_time,end_time)";
const MAX_DOCTOR_NOTES_LENGTH: usize = 2000;
const UPCOMING_LIMIT: usize = 10;

pub struct AppointmentService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    slots: SlotService,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            slots: SlotService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub async fn list_appointments(
        &self,
        doctor_id: &str,
        query: &AppointmentQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing appointments for doctor: {}", doctor_id);

        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&{}&order=created_at.desc",
            doctor_id, WITH_SLOT
        );
        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        if let Some(limit) = query.limit {
            path.push_str(&format!("&limit={}", limit));
        }

        let appointments: Vec<Appointment> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(appointments)
    }

    pub async fn get_appointment(
        &self,
        doctor_id: &str,
        appointment_id: &str,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&doctor_id=eq.{}&{}",
            appointment_id, doctor_id, WITH_SLOT
        );
        let result: Vec<Appointment> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    /// Move a confirmed appointment to its outcome. The slot stays booked
    /// whatever the outcome, cancellation included.
    pub async fn update_status(
        &self,
        doctor_id: &str,
        appointment_id: &str,
        request: UpdateStatusRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(doctor_id, appointment_id, auth_token).await?;
        self.lifecycle.validate_status_transition(current.status, request.status)?;

        let mut update_data = serde_json::Map::new();
        update_data.insert("status".to_string(), json!(request.status));
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        if let Some(notes) = request.doctor_notes.as_deref() {
            validate_doctor_notes(notes)?;
            update_data.insert("doctor_notes".to_string(), json!(non_blank(Some(notes))));
        }

        // Conditional on the status we validated against.
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&doctor_id=eq.{}&status=eq.{}&{}",
            appointment_id, doctor_id, AppointmentStatus::Confirmed, WITH_SLOT
        );
        let updated: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(return_representation()),
        ).await?;

        let appointment = updated.into_iter().next().ok_or_else(|| {
            warn!("Appointment {} changed status before update to {}", appointment_id, request.status);
            AppointmentError::StatusChanged
        })?;

        info!("Appointment {} marked {}", appointment.id, appointment.status);
        Ok(appointment)
    }

    pub async fn update_notes(
        &self,
        doctor_id: &str,
        appointment_id: &str,
        doctor_notes: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating notes on appointment: {}", appointment_id);

        if let Some(notes) = doctor_notes.as_deref() {
            validate_doctor_notes(notes)?;
        }

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&doctor_id=eq.{}&{}",
            appointment_id, doctor_id, WITH_SLOT
        );
        let updated: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({
                "doctor_notes": non_blank(doctor_notes.as_deref()),
                "updated_at": Utc::now().to_rfc3339()
            })),
            Some(return_representation()),
        ).await?;

        updated.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    /// Dashboard landing data. Only available once the profile is complete.
    pub async fn dashboard_summary(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<DashboardSummary, AppointmentError> {
        let doctor = self.doctors.require_completed_profile(doctor_id, auth_token).await?;
        debug!("Building dashboard for {}", doctor.display_name());

        let appointments = self
            .list_appointments(doctor_id, &AppointmentQuery::default(), auth_token)
            .await?;
        let open_slots = self.slots.get_available_slots(doctor_id, None, None).await?.len();

        Ok(summarize(appointments, open_slots, today()))
    }
}

fn validate_doctor_notes(notes: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if notes.chars().count() > MAX_DOCTOR_NOTES_LENGTH {
        errors.add(
            "doctor_notes",
            format!("Notes must be at most {} characters", MAX_DOCTOR_NOTES_LENGTH),
        );
    }
    errors.into_result()
}

/// Fold a practitioner's appointments into dashboard figures.
pub fn summarize(appointments: Vec<Appointment>, open_slots: usize, today: NaiveDate) -> DashboardSummary {
    let mut counts = StatusCounts {
        total: appointments.len(),
        ..StatusCounts::default()
    };
    for appointment in &appointments {
        match appointment.status {
            AppointmentStatus::Confirmed => counts.confirmed += 1,
            AppointmentStatus::Completed => counts.completed += 1,
            AppointmentStatus::Cancelled => counts.cancelled += 1,
            AppointmentStatus::NoShow => counts.no_show += 1,
        }
    }

    let by_slot_time = |a: &Appointment| a.slot.as_ref().map(|slot| (slot.slot_date, slot.start_time));

    let mut todays: Vec<Appointment> = appointments
        .iter()
        .filter(|a| a.slot_date() == Some(today))
        .cloned()
        .collect();
    todays.sort_by_key(by_slot_time);

    let mut upcoming: Vec<Appointment> = appointments
        .into_iter()
        .filter(|a| a.status == AppointmentStatus::Confirmed)
        .filter(|a| a.slot_date().map(|date| date >= today).unwrap_or(false))
        .collect();
    upcoming.sort_by_key(by_slot_time);
    upcoming.truncate(UPCOMING_LIMIT);

    DashboardSummary {
        counts,
        today: todays,
        upcoming,
        open_slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveTime};
    use uuid::Uuid;

    use crate::models::SlotSummary;

    fn appointment(status: AppointmentStatus, date: NaiveDate, hour: u32) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            slot_id: Uuid::new_v4(),
            doctor_id: Uuid::nil(),
            patient_name: "Sam Patient".to_string(),
            patient_phone: "+1 555 987 6543".to_string(),
            patient_email: None,
            patient_notes: None,
            status,
            doctor_notes: None,
            created_at: Utc::now(),
            updated_at: None,
            slot: Some(SlotSummary {
                slot_date: date,
                start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(hour, 20, 0).unwrap(),
            }),
        }
    }

    #[test]
    fn summary_counts_by_status_and_orders_by_slot() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let yesterday = today - Duration::days(1);
        let next_week = today + Duration::days(7);

        let appointments = vec![
            appointment(AppointmentStatus::Confirmed, next_week, 9),
            appointment(AppointmentStatus::Confirmed, today, 11),
            appointment(AppointmentStatus::Completed, today, 8),
            appointment(AppointmentStatus::NoShow, yesterday, 9),
            appointment(AppointmentStatus::Cancelled, next_week, 10),
            appointment(AppointmentStatus::Confirmed, yesterday, 15),
        ];

        let summary = summarize(appointments, 4, today);

        assert_eq!(
            summary.counts,
            StatusCounts { total: 6, confirmed: 3, completed: 1, cancelled: 1, no_show: 1 }
        );
        assert_eq!(summary.open_slots, 4);

        let today_hours: Vec<u32> = summary.today.iter()
            .map(|a| a.slot.as_ref().unwrap().start_time.format("%H").to_string().parse().unwrap())
            .collect();
        assert_eq!(today_hours, vec![8, 11]);

        assert_eq!(summary.upcoming.len(), 2);
        assert_eq!(summary.upcoming[0].slot_date(), Some(today));
        assert_eq!(summary.upcoming[1].slot_date(), Some(next_week));
    }

    #[test]
    fn upcoming_is_capped() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let appointments = (0..15)
            .map(|day| appointment(AppointmentStatus::Confirmed, today + Duration::days(day), 9))
            .collect();

        assert_eq!(summarize(appointments, 0, today).upcoming.len(), UPCOMING_LIMIT);
    }

    #[test]
    fn long_doctor_notes_are_rejected() {
        assert!(validate_doctor_notes("Follow up in two weeks").is_ok());
        assert!(validate_doctor_notes(&"x".repeat(MAX_DOCTOR_NOTES_LENGTH + 1)).is_err());
    }
}
