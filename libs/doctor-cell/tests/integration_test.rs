use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};

use doctor_cell::router::doctor_routes;
use shared_database::{schema::APPOINTMENTS, AppState};
use shared_utils::test_utils::{send_json, JwtTestUtils, TestConfig, TestUser};
use user_cell::{RegisterUserRequest, UserService};

// 2030-03-04 is a Monday
const MONDAY: &str = "2030-03-04";

struct Harness {
    app: axum::Router,
    state: Arc<AppState>,
    secret: String,
}

impl Harness {
    fn new() -> Self {
        let test_config = TestConfig::default();
        let state = test_config.to_state();
        Self {
            app: doctor_routes(state.clone()),
            state,
            secret: test_config.jwt_secret,
        }
    }

    fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.secret, Some(1))
    }

    async fn register(&self, user: &TestUser, full_name: &str) {
        UserService::new(self.state.store.clone())
            .register(
                &user.to_auth_user(),
                RegisterUserRequest { email: None, full_name: full_name.to_string(), phone: None, role: None },
            )
            .await
            .unwrap();
    }

    async fn create_profile(&self, doctor: &TestUser, license: &str, body_extra: Value) -> Value {
        let mut body = json!({ "specialization": "Cardiology", "license_number": license });
        if let (Some(target), Some(extra)) = (body.as_object_mut(), body_extra.as_object()) {
            target.extend(extra.clone());
        }

        let (status, body) = send_json(&self.app, "POST", "/", Some(&self.token(doctor)), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["doctor"].clone()
    }
}

#[tokio::test]
async fn test_create_and_fetch_public_profile() {
    let harness = Harness::new();
    let doctor = TestUser::doctor("ada@example.com");
    harness.register(&doctor, "Dr. Ada Lane").await;

    let profile = harness.create_profile(&doctor, "MD-100", json!({ "slot_minutes": 20 })).await;
    assert_eq!(profile["full_name"], "Dr. Ada Lane");
    assert_eq!(profile["slot_minutes"], 20);

    let id = profile["id"].as_str().unwrap();
    let (status, body) = send_json(&harness.app, "GET", &format!("/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["license_number"], "MD-100");

    let (status, body) = send_json(&harness.app, "GET", "/?specialization=Cardiology", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (_, body) = send_json(&harness.app, "GET", "/?specialization=Dermatology", None, None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_create_requires_authentication() {
    let harness = Harness::new();

    let (status, _) = send_json(
        &harness.app,
        "POST",
        "/",
        None,
        Some(json!({ "specialization": "Cardiology", "license_number": "MD-1" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_license_is_conflict() {
    let harness = Harness::new();
    let first = TestUser::doctor("one@example.com");
    let second = TestUser::doctor("two@example.com");
    harness.register(&first, "Dr. One").await;
    harness.register(&second, "Dr. Two").await;

    harness.create_profile(&first, "MD-7", json!({})).await;

    let (status, body) = send_json(
        &harness.app,
        "POST",
        "/",
        Some(&harness.token(&second)),
        Some(json!({ "specialization": "Neurology", "license_number": "MD-7" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn test_accepting_only_filter() {
    let harness = Harness::new();
    let open = TestUser::doctor("open@example.com");
    let closed = TestUser::doctor("closed@example.com");
    harness.register(&open, "Dr. Open").await;
    harness.register(&closed, "Dr. Closed").await;

    harness.create_profile(&open, "MD-1", json!({})).await;
    harness.create_profile(&closed, "MD-2", json!({ "is_accepting_patients": false })).await;

    let (_, body) = send_json(&harness.app, "GET", "/?accepting_only=true", None, None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["doctors"][0]["full_name"], "Dr. Open");
}

#[tokio::test]
async fn test_update_is_owner_only() {
    let harness = Harness::new();
    let doctor = TestUser::doctor("ada@example.com");
    let stranger = TestUser::doctor("stranger@example.com");
    harness.register(&doctor, "Dr. Ada Lane").await;

    let profile = harness.create_profile(&doctor, "MD-100", json!({})).await;
    let uri = format!("/{}", profile["id"].as_str().unwrap());

    let (status, _) = send_json(
        &harness.app,
        "PUT",
        &uri,
        Some(&harness.token(&stranger)),
        Some(json!({ "bio": "Not mine" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send_json(
        &harness.app,
        "PUT",
        &uri,
        Some(&harness.token(&doctor)),
        Some(json!({ "bio": "Twenty years in cardiology" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["doctor"]["bio"], "Twenty years in cardiology");
}

#[tokio::test]
async fn test_overlapping_windows_rejected() {
    let harness = Harness::new();
    let doctor = TestUser::doctor("ada@example.com");
    harness.register(&doctor, "Dr. Ada Lane").await;
    let profile = harness.create_profile(&doctor, "MD-100", json!({})).await;

    let (status, body) = send_json(
        &harness.app,
        "PUT",
        &format!("/{}/availability", profile["id"].as_str().unwrap()),
        Some(&harness.token(&doctor)),
        Some(json!({ "windows": [
            { "day_of_week": 1, "start_time": "09:00", "end_time": "12:00" },
            { "day_of_week": 1, "start_time": "11:30", "end_time": "13:00" }
        ]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_day_availability_marks_booked_slots() {
    let harness = Harness::new();
    let doctor = TestUser::doctor("ada@example.com");
    harness.register(&doctor, "Dr. Ada Lane").await;
    let profile = harness.create_profile(&doctor, "MD-100", json!({})).await;
    let doctor_id = profile["id"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        &harness.app,
        "PUT",
        &format!("/{}/availability", doctor_id),
        Some(&harness.token(&doctor)),
        Some(json!({ "windows": [{ "day_of_week": 1, "start_time": "09:00", "end_time": "11:00" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for (time, status) in [("09:30", "scheduled"), ("10:00", "cancelled")] {
        harness
            .state
            .store
            .insert(APPOINTMENTS, json!({
                "id": uuid::Uuid::new_v4(),
                "doctor_id": doctor_id,
                "patient_id": "patient-1",
                "date": MONDAY,
                "time": time,
                "status": status,
            }))
            .await
            .unwrap();
    }

    let (status, body) = send_json(
        &harness.app,
        "GET",
        &format!("/{}/availability?date={}", doctor_id, MONDAY),
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slots"], json!([
        { "time": "09:00", "available": true },
        { "time": "09:30", "available": false },
        { "time": "10:00", "available": true },
        { "time": "10:30", "available": true }
    ]));

    // Tuesday has no window
    let (_, body) = send_json(&harness.app, "GET", &format!("/{}/availability?date=2030-03-05", doctor_id), None, None).await;
    assert_eq!(body["slots"], json!([]));

    // 2020-03-02 was a Monday; its slots are listed but can no longer be taken
    let (status, body) = send_json(&harness.app, "GET", &format!("/{}/availability?date=2020-03-02", doctor_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slots"].as_array().unwrap().len(), 4);
    assert!(body["slots"].as_array().unwrap().iter().all(|slot| slot["available"] == false));
}

#[tokio::test]
async fn test_day_availability_validates_input() {
    let harness = Harness::new();

    let (status, _) = send_json(
        &harness.app,
        "GET",
        &format!("/{}/availability?date=2030-13-01", uuid::Uuid::new_v4()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        &harness.app,
        "GET",
        &format!("/{}/availability?date={}", uuid::Uuid::new_v4(), MONDAY),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
