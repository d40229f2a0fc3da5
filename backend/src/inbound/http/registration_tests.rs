//! Tests for the registration handler.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{App, test as actix_test};
use rstest::rstest;
use serde_json::{Value, json};

use super::*;
use crate::domain::ports::{MockAccountRegistration, MockProfileQuery};
use crate::domain::{AccountId, RegistrationError};
use crate::inbound::http::ErrorBody;
use crate::inbound::http::idempotency::IDEMPOTENCY_KEY_HEADER;

const ACCOUNT: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

fn receipt(replayed: bool) -> RegistrationReceipt {
    RegistrationReceipt {
        account_id: AccountId::new(ACCOUNT).expect("id"),
        created_at: DateTime::from_timestamp(1_767_225_600, 0).expect("timestamp"),
        replayed,
    }
}

fn test_app(
    registration: MockAccountRegistration,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let state = HttpState::new(Arc::new(registration), Arc::new(MockProfileQuery::new()));
    App::new()
        .app_data(web::Data::new(state))
        .service(web::scope("/api/v1").service(register_user))
}

fn payload() -> Value {
    json!({
        "email": "a@x.com",
        "username": "alice",
        "password": "pw123",
        "displayAttributes": {"displayName": "Alice"}
    })
}

#[rstest]
#[actix_web::test]
async fn fresh_registration_is_created() {
    let mut registration = MockAccountRegistration::new();
    registration
        .expect_register()
        .withf(|request| {
            request.idempotency_key == "k1"
                && request.email == "a@x.com"
                && request.raw_password.as_str() == "pw123"
                && request.display_attributes.get("displayName").map(String::as_str) == Some("Alice")
        })
        .times(1)
        .returning(|_| Ok(receipt(false)));
    let app = actix_test::init_service(test_app(registration)).await;

    let req = actix_test::TestRequest::post()
        .uri("/api/v1/users")
        .insert_header((IDEMPOTENCY_KEY_HEADER, "k1"))
        .set_json(payload())
        .to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.headers().get(IDEMPOTENT_REPLAYED_HEADER).is_none());
    let body: RegisteredUserBody = actix_test::read_body_json(res).await;
    assert_eq!(body.account_id, ACCOUNT);
}

#[rstest]
#[actix_web::test]
async fn replay_is_ok_and_flagged() {
    let mut registration = MockAccountRegistration::new();
    registration
        .expect_register()
        .returning(|_| Ok(receipt(true)));
    let app = actix_test::init_service(test_app(registration)).await;

    let req = actix_test::TestRequest::post()
        .uri("/api/v1/users")
        .insert_header((IDEMPOTENCY_KEY_HEADER, "k1"))
        .set_json(payload())
        .to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()
            .get(IDEMPOTENT_REPLAYED_HEADER)
            .and_then(|value| value.to_str().ok()),
        Some("true")
    );
}

#[rstest]
#[actix_web::test]
async fn client_nonce_derives_the_key() {
    let expected = RegistrationRequest::derived_key("a@x.com", "alice", "n-1");
    let mut registration = MockAccountRegistration::new();
    registration
        .expect_register()
        .withf(move |request| request.idempotency_key == expected.as_str())
        .times(1)
        .returning(|_| Ok(receipt(false)));
    let app = actix_test::init_service(test_app(registration)).await;

    let mut body = payload();
    body["clientNonce"] = json!("n-1");
    let req = actix_test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(body)
        .to_request();
    let res = actix_test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[rstest]
#[actix_web::test]
async fn missing_key_and_nonce_is_rejected_before_registering() {
    let mut registration = MockAccountRegistration::new();
    registration.expect_register().never();
    let app = actix_test::init_service(test_app(registration)).await;

    let req = actix_test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(payload())
        .to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = actix_test::read_body_json(res).await;
    assert_eq!(body.code, "invalid_request");
}

#[rstest]
#[case::duplicate_email(RegistrationError::DuplicateEmail, StatusCode::CONFLICT, "duplicate_email")]
#[case::duplicate_username(
    RegistrationError::DuplicateUsername,
    StatusCode::CONFLICT,
    "duplicate_username"
)]
#[case::conflict(RegistrationError::Conflict, StatusCode::CONFLICT, "conflict")]
#[case::invalid(
    RegistrationError::invalid_input("email", "email address is not valid"),
    StatusCode::BAD_REQUEST,
    "invalid_input"
)]
#[case::unavailable(
    RegistrationError::store_unavailable("pool timed out"),
    StatusCode::SERVICE_UNAVAILABLE,
    "store_unavailable"
)]
#[case::unknown(
    RegistrationError::unknown("join error"),
    StatusCode::INTERNAL_SERVER_ERROR,
    "unknown"
)]
#[actix_web::test]
async fn registration_errors_map_to_statuses(
    #[case] failure: RegistrationError,
    #[case] status: StatusCode,
    #[case] reason: &str,
) {
    let mut registration = MockAccountRegistration::new();
    registration
        .expect_register()
        .return_once(move |_| Err(failure));
    let app = actix_test::init_service(test_app(registration)).await;

    let req = actix_test::TestRequest::post()
        .uri("/api/v1/users")
        .insert_header((IDEMPOTENCY_KEY_HEADER, "k1"))
        .set_json(payload())
        .to_request();
    let res = actix_test::call_service(&app, req).await;

    assert_eq!(res.status(), status);
    let body: ErrorBody = actix_test::read_body_json(res).await;
    assert_eq!(
        body.details
            .as_ref()
            .and_then(|details| details.get("reason"))
            .and_then(Value::as_str),
        Some(reason)
    );
    assert!(!body.message.contains("join error"));
    assert!(!body.message.contains("pool timed out"));
}
