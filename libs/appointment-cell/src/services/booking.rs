use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doctor_cell::services::DoctorService;
use schedule_cell::models::TimeSlot;
use schedule_cell::services::SlotService;
use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};
use shared_database::DatabaseError;
use shared_models::error::FieldErrors;
use shared_models::time::today;
use shared_utils::validation::{is_valid_email, non_blank, validate_phone};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookingConfirmation, BookingPage,
    BookingRequest,
};

pub const MAX_PATIENT_NOTES_LENGTH: usize = 500;

/// Public, unauthenticated booking. Every write here runs with the service
/// role since the patient holds no session.
pub struct BookingService {
    admin: SupabaseClient,
    doctors: DoctorService,
    slots: SlotService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            admin: SupabaseClient::service_role(config),
            doctors: DoctorService::new(config),
            slots: SlotService::new(config),
        }
    }

    pub async fn booking_page(
        &self,
        username: &str,
        window_days: Option<i64>,
        limit: Option<usize>,
    ) -> Result<BookingPage, AppointmentError> {
        let doctor = self.doctors.get_public_profile(username).await?;
        let slots = self.slots
            .get_available_slots(&doctor.id.to_string(), window_days, limit)
            .await?;

        Ok(BookingPage { doctor, slots })
    }

    /// Book a slot on the practitioner page identified by `username`.
    pub async fn book_appointment(
        &self,
        username: &str,
        request: BookingRequest,
    ) -> Result<BookingConfirmation, AppointmentError> {
        let slot_id = validate_booking(&request)?;
        let doctor = self.doctors.get_public_profile(username).await?;

        let (appointment, slot) = self
            .claim_slot(&doctor.id.to_string(), slot_id, &request)
            .await?;

        Ok(BookingConfirmation { appointment, doctor, slot })
    }

    /// Claim `slot_id` for the patient in `request`. The slot flips to booked
    /// before the appointment row exists; a failed insert hands it back
    /// unless the failure proves another appointment already owns it.
    pub async fn claim_slot(
        &self,
        doctor_id: &str,
        slot_id: Uuid,
        request: &BookingRequest,
    ) -> Result<(Appointment, TimeSlot), AppointmentError> {
        let slot_id = slot_id.to_string();
        debug!("Claiming slot {} for doctor {}", slot_id, doctor_id);

        let slot = self.slots.find_slot(doctor_id, &slot_id, None).await?
            .ok_or(AppointmentError::SlotNotFound)?;

        if !slot.is_bookable(today()) {
            warn!("Slot {} is not bookable", slot_id);
            return Err(AppointmentError::SlotUnavailable);
        }

        let Some(slot) = self.slots.mark_booked(doctor_id, &slot_id).await? else {
            warn!("Lost the race for slot {}", slot_id);
            return Err(AppointmentError::SlotUnavailable);
        };

        match self.insert_appointment(doctor_id, &slot_id, request).await {
            Ok(appointment) => {
                info!(
                    "Appointment {} booked on {} at {} with doctor {}",
                    appointment.id, slot.slot_date, slot.start_time.format("%H:%M"), doctor_id
                );
                Ok((appointment, slot))
            }
            Err(e) if DatabaseError::is_conflict(&e) => {
                // The slot already has an appointment; it must stay booked.
                warn!("Slot {} already holds an appointment", slot_id);
                Err(AppointmentError::SlotUnavailable)
            }
            Err(e) => {
                error!("Failed to create appointment for slot {}: {}", slot_id, e);
                if let Err(release_err) = self.slots.release(&slot_id).await {
                    error!("Failed to release slot {}, it stays booked without an appointment: {}", slot_id, release_err);
                }
                Err(AppointmentError::Database(e.to_string()))
            }
        }
    }

    async fn insert_appointment(
        &self,
        doctor_id: &str,
        slot_id: &str,
        request: &BookingRequest,
    ) -> anyhow::Result<Appointment> {
        let now = Utc::now().to_rfc3339();
        let appointment_data = json!({
            "slot_id": slot_id,
            "doctor_id": doctor_id,
            "patient_name": request.patient_name.trim(),
            "patient_phone": request.patient_phone.trim(),
            "patient_email": non_blank(request.patient_email.as_deref()),
            "patient_notes": non_blank(request.patient_notes.as_deref()),
            "status": AppointmentStatus::Confirmed,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Appointment> = self.admin.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            None,
            Some(appointment_data),
            Some(return_representation()),
        ).await?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Appointment insert returned no rows"))
    }
}

/// Field checks for the public booking form. Returns the parsed slot id.
pub fn validate_booking(request: &BookingRequest) -> Result<Uuid, FieldErrors> {
    let mut errors = FieldErrors::new();

    let slot_id = Uuid::parse_str(request.slot_id.trim());
    if slot_id.is_err() {
        errors.add("slot_id", "Please choose a time slot");
    }

    if request.patient_name.trim().chars().count() < 2 {
        errors.add("patient_name", "Name must be at least 2 characters");
    }

    if let Err(msg) = validate_phone(&request.patient_phone) {
        errors.add("patient_phone", msg);
    }

    if let Some(email) = non_blank(request.patient_email.as_deref()) {
        if !is_valid_email(&email) {
            errors.add("patient_email", "Please enter a valid email address");
        }
    }

    let notes_length = request.patient_notes.as_deref().map(|n| n.trim().chars().count()).unwrap_or(0);
    if notes_length > MAX_PATIENT_NOTES_LENGTH {
        errors.add(
            "patient_notes",
            format!("Notes must be at most {} characters", MAX_PATIENT_NOTES_LENGTH),
        );
    }

    match slot_id {
        Ok(slot_id) if errors.is_empty() => Ok(slot_id),
        _ => Err(errors),
    }
}
