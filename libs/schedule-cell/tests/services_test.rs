use assert_matches::assert_matches;
use chrono::Duration;
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, headers, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use schedule_cell::models::{CreateSlotRequest, ScheduleError};
use schedule_cell::services::{SlotGenerationService, SlotService};
use shared_config::SlotGenerationMode;
use shared_models::time::today;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const TOKEN: &str = "doctor-token";

fn every_day() -> Vec<i32> {
    (0..=6).collect()
}

fn row_count(expected: usize) -> impl Fn(&Request) -> bool + Send + Sync + 'static {
    move |request: &Request| {
        serde_json::from_slice::<Vec<Value>>(&request.body)
            .map(|rows| rows.len() == expected)
            .unwrap_or(false)
    }
}

#[tokio::test]
async fn generation_skips_existing_slots_and_inserts_the_rest_in_one_call() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();
    let today = today();

    Mock::given(method("GET"))
        .and(path("/rest/v1/recurring_schedules"))
        .and(query_param("is_active", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::schedule_response(&Uuid::new_v4().to_string(), &doctor_id, &every_day(), "09:00", "10:00", 30)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("select", "slot_date,start_time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "slot_date": today, "start_time": "09:00:00" }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Two days of two slots each, minus the one already stored.
    Mock::given(method("POST"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("on_conflict", "doctor_id,slot_date,start_time"))
        .and(headers("Prefer", vec!["resolution=ignore-duplicates", "return=representation"]))
        .and(row_count(3))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{}, {}, {}])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let service = SlotGenerationService::new(&config);

    let result = service.generate_slots(&doctor_id, 2, TOKEN).await.unwrap();

    assert_eq!(result.created, 3);
    assert_eq!(result.days_ahead, 2);
}

#[tokio::test]
async fn generation_without_active_schedules_creates_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/recurring_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let result = SlotGenerationService::new(&config)
        .generate_slots(&Uuid::new_v4().to_string(), 7, TOKEN)
        .await
        .unwrap();

    assert_eq!(result.created, 0);
}

#[tokio::test]
async fn generation_rejects_out_of_range_horizon() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let service = SlotGenerationService::new(&config);

    for days in [0, 91, -3] {
        let err = service.generate_slots("doctor", days, TOKEN).await.unwrap_err();
        assert_matches!(err, ScheduleError::Validation(fields) if fields.contains("days_ahead"));
    }
}

#[tokio::test]
async fn store_mode_delegates_to_rpc() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/generate_slots_from_schedules"))
        .and(body_partial_json(json!({ "doctor_uuid": doctor_id, "days_ahead": 15 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(12)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    config.slot_generation_mode = SlotGenerationMode::Store;

    let result = SlotGenerationService::new(&config)
        .generate_slots(&doctor_id, 15, TOKEN)
        .await
        .unwrap();

    assert_eq!(result.created, 12);
}

#[tokio::test]
async fn deleting_a_booked_slot_is_refused() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();
    let slot_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("id", format!("eq.{}", slot_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::slot_response(&slot_id, &doctor_id, today(), "09:00", "09:20", true)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let err = SlotService::new(&config)
        .delete_slot(&doctor_id, &slot_id, TOKEN)
        .await
        .unwrap_err();

    assert_matches!(err, ScheduleError::SlotBooked);
}

#[tokio::test]
async fn deleting_an_open_slot_filters_on_unbooked() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();
    let slot_id = Uuid::new_v4().to_string();
    let slot = MockSupabaseResponses::slot_response(&slot_id, &doctor_id, today(), "09:00", "09:20", false);

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot.clone()])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("is_booked", "eq.false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    SlotService::new(&config)
        .delete_slot(&doctor_id, &slot_id, TOKEN)
        .await
        .unwrap();
}

#[tokio::test]
async fn duplicate_ad_hoc_slot_is_a_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::unique_violation("time_slots_doctor_id_slot_date_start_time_key"),
        ))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let request = CreateSlotRequest {
        slot_date: (today() + Duration::days(1)).format("%Y-%m-%d").to_string(),
        start_time: "14:00".to_string(),
        end_time: "14:30".to_string(),
    };

    let err = SlotService::new(&config)
        .create_slot(&Uuid::new_v4().to_string(), request, TOKEN)
        .await
        .unwrap_err();

    assert_matches!(err, ScheduleError::DuplicateSlot);
}

#[tokio::test]
async fn ad_hoc_slot_in_the_past_is_rejected_before_the_store() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let request = CreateSlotRequest {
        slot_date: (today() - Duration::days(1)).format("%Y-%m-%d").to_string(),
        start_time: "15:00".to_string(),
        end_time: "14:00".to_string(),
    };

    let err = SlotService::new(&config)
        .create_slot("doctor", request, TOKEN)
        .await
        .unwrap_err();

    assert_matches!(err, ScheduleError::Validation(fields) => {
        assert!(fields.contains("slot_date"));
        assert!(fields.contains("end_time"));
    });
}

#[tokio::test]
async fn sub_minute_ad_hoc_slot_is_rejected_before_the_store() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let request = CreateSlotRequest {
        slot_date: (today() + Duration::days(1)).format("%Y-%m-%d").to_string(),
        start_time: "09:00:00".to_string(),
        end_time: "09:00:30".to_string(),
    };

    let err = SlotService::new(&config)
        .create_slot("doctor", request, TOKEN)
        .await
        .unwrap_err();

    assert_matches!(err, ScheduleError::Validation(fields) => {
        assert!(fields.contains("end_time"));
        assert!(!fields.contains("slot_date"));
    });
}

#[tokio::test]
async fn availability_never_includes_booked_slots() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();
    let tomorrow = today() + Duration::days(1);

    // A stale read that still carries a booked row.
    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("is_booked", "eq.false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::slot_response(&Uuid::new_v4().to_string(), &doctor_id, tomorrow, "09:00", "09:20", true),
            MockSupabaseResponses::slot_response(&Uuid::new_v4().to_string(), &doctor_id, tomorrow, "09:20", "09:40", false)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let slots = SlotService::new(&config)
        .get_available_slots(&doctor_id, Some(365), None)
        .await
        .unwrap();

    assert_eq!(slots.len(), 1);
    assert!(!slots[0].is_booked);
}
