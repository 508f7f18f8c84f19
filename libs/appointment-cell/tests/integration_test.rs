use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};

use appointment_cell::router::appointment_routes;
use doctor_cell::{CreateDoctorRequest, DoctorService};
use shared_database::AppState;
use shared_utils::test_utils::{send_json, JwtTestUtils, TestConfig, TestUser};
use user_cell::{RegisterUserRequest, UserService};

// 2099-03-02 is a Monday
const MONDAY: &str = "2099-03-02";

struct Harness {
    app: axum::Router,
    secret: String,
    patient: TestUser,
    doctor_user: TestUser,
    doctor_id: String,
}

impl Harness {
    async fn new() -> Self {
        let test_config = TestConfig::default();
        let state = test_config.to_state();

        let patient = TestUser::patient("patient@example.com");
        let doctor_user = TestUser::doctor("doctor@example.com");
        register(&state, &patient, "Pat Example").await;
        register(&state, &doctor_user, "Dr. Ada Lane").await;

        let doctor = DoctorService::new(state.store.clone())
            .create_doctor(
                &doctor_user.to_auth_user(),
                CreateDoctorRequest {
                    user_id: None,
                    specialization: "General Practice".to_string(),
                    license_number: "GP-1".to_string(),
                    bio: None,
                    slot_minutes: None,
                    is_accepting_patients: None,
                    availability: None,
                },
            )
            .await
            .unwrap();

        Self {
            app: appointment_routes(state),
            secret: test_config.jwt_secret,
            patient,
            doctor_user,
            doctor_id: doctor.id.to_string(),
        }
    }

    fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.secret, Some(1))
    }

    fn patient_token(&self) -> String {
        self.token(&self.patient)
    }

    fn doctor_token(&self) -> String {
        self.token(&self.doctor_user)
    }

    async fn book(&self, date: &str, time: &str) -> (StatusCode, Value) {
        send_json(
            &self.app,
            "POST",
            "/",
            Some(&self.patient_token()),
            Some(json!({
                "doctor_id": self.doctor_id,
                "date": date,
                "time": time,
                "reason": "Persistent cough"
            })),
        )
        .await
    }
}

async fn register(state: &Arc<AppState>, user: &TestUser, name: &str) {
    UserService::new(state.store.clone())
        .register(
            &user.to_auth_user(),
            RegisterUserRequest { email: None, full_name: name.to_string(), phone: None, role: None },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_book_conflict_cancel_rebook() {
    let harness = Harness::new().await;

    let (status, body) = harness.book(MONDAY, "10:00").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["appointment"]["status"], "scheduled");
    assert_eq!(body["appointment"]["time"], "10:00");
    let id = body["appointment"]["id"].as_str().unwrap().to_string();

    let (status, body) = harness.book(MONDAY, "10:00").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "slot_unavailable");

    let (status, body) = send_json(
        &harness.app,
        "POST",
        &format!("/{}/cancel", id),
        Some(&harness.patient_token()),
        Some(json!({ "reason": "Travelling" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "cancelled");
    assert_eq!(body["appointment"]["cancellation_reason"], "Travelling");

    let (status, _) = harness.book(MONDAY, "10:00").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_cancel_without_body() {
    let harness = Harness::new().await;
    let (_, body) = harness.book(MONDAY, "10:00").await;
    let id = body["appointment"]["id"].as_str().unwrap().to_string();

    let (status, body) = send_json(&harness.app, "POST", &format!("/{}/cancel", id), Some(&harness.patient_token()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "cancelled");
}

#[tokio::test]
async fn test_past_date_is_bad_request() {
    let harness = Harness::new().await;

    let (status, body) = harness.book("2020-01-06", "10:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let harness = Harness::new().await;

    let (status, body) = send_json(
        &harness.app,
        "POST",
        "/",
        Some(&harness.patient_token()),
        Some(json!({ "doctor_id": "not-a-uuid", "date": MONDAY })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_unknown_doctor_is_not_found() {
    let harness = Harness::new().await;

    let (status, body) = send_json(
        &harness.app,
        "POST",
        "/",
        Some(&harness.patient_token()),
        Some(json!({
            "doctor_id": uuid::Uuid::new_v4(),
            "date": MONDAY,
            "time": "10:00",
            "reason": "Checkup"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_lifecycle_over_http() {
    let harness = Harness::new().await;
    let (_, body) = harness.book(MONDAY, "10:00").await;
    let id = body["appointment"]["id"].as_str().unwrap().to_string();
    let doctor = harness.doctor_token();

    // patients cannot confirm
    let (status, _) = send_json(&harness.app, "POST", &format!("/{}/confirm", id), Some(&harness.patient_token()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for (action, expected) in [("confirm", "confirmed"), ("start", "in-progress"), ("complete", "completed")] {
        let (status, body) = send_json(&harness.app, "POST", &format!("/{}/{}", id, action), Some(&doctor), None).await;
        assert_eq!(status, StatusCode::OK, "{action}");
        assert_eq!(body["appointment"]["status"], expected);
    }

    let (status, body) = send_json(&harness.app, "POST", &format!("/{}/cancel", id), Some(&doctor), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "invalid_status_transition");
}

#[tokio::test]
async fn test_no_show_is_final() {
    let harness = Harness::new().await;
    let (_, body) = harness.book(MONDAY, "10:00").await;
    let id = body["appointment"]["id"].as_str().unwrap().to_string();
    let doctor = harness.doctor_token();

    let (status, body) = send_json(&harness.app, "POST", &format!("/{}/no-show", id), Some(&doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "no-show");

    let (status, _) = send_json(&harness.app, "POST", &format!("/{}/confirm", id), Some(&doctor), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reschedule_over_http() {
    let harness = Harness::new().await;
    let (_, body) = harness.book(MONDAY, "10:00").await;
    let id = body["appointment"]["id"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &harness.app,
        "POST",
        &format!("/{}/reschedule", id),
        Some(&harness.patient_token()),
        Some(json!({ "date": MONDAY, "time": "14:30" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["time"], "14:30");
    assert_eq!(body["appointment"]["status"], "scheduled");
}

#[tokio::test]
async fn test_slot_check_endpoint() {
    let harness = Harness::new().await;
    harness.book(MONDAY, "10:00").await;
    let token = harness.patient_token();

    let (status, body) = send_json(
        &harness.app,
        "GET",
        &format!("/availability?doctor_id={}&date={}&time=10:00", harness.doctor_id, MONDAY),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);

    let (_, body) = send_json(
        &harness.app,
        "GET",
        &format!("/availability?doctor_id={}&date={}&time=10:30", harness.doctor_id, MONDAY),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["available"], true);
}

#[tokio::test]
async fn test_list_and_get() {
    let harness = Harness::new().await;
    let (_, body) = harness.book(MONDAY, "10:00").await;
    let id = body["appointment"]["id"].as_str().unwrap().to_string();

    let (status, body) = send_json(&harness.app, "GET", "/?status=scheduled", Some(&harness.patient_token()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (_, body) = send_json(&harness.app, "GET", "/?status=completed", Some(&harness.patient_token()), None).await;
    assert_eq!(body["total"], 0);

    let (status, body) = send_json(&harness.app, "GET", &format!("/{}", id), Some(&harness.doctor_token()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reason"], "Persistent cough");

    let stranger = harness.token(&TestUser::patient("nosy@example.com"));
    let (status, _) = send_json(&harness.app, "GET", &format!("/{}", id), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_requires_authentication() {
    let harness = Harness::new().await;

    let (status, body) = send_json(&harness.app, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let expired = JwtTestUtils::create_expired_token(&harness.patient, &harness.secret);
    let (status, _) = send_json(&harness.app, "GET", "/", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
