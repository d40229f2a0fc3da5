//! Server construction, adapter wiring and background maintenance.

mod config;
mod state_builders;

pub use config::{AppSettings, SettingsError};
pub use state_builders::{Adapters, Services, build_adapters, build_services};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::domain::ports::ProfileCacheError;
use crate::domain::{Error, MaintenanceSweep};
use crate::inbound::http::health::{HealthState, live, ready};
use crate::inbound::http::profiles::get_profile;
use crate::inbound::http::registration::register_user;
use crate::inbound::http::state::HttpState;
use crate::middleware::Trace;
use crate::outbound::persistence::{MigrationError, PoolError};

/// Failures that stop the process before it starts serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("failed to connect the profile cache: {0}")]
    Cache(#[from] ProfileCacheError),
}

impl From<&Services> for HttpState {
    fn from(services: &Services) -> Self {
        HttpState::new(
            Arc::new(services.registration.clone()),
            Arc::new(services.profiles.clone()),
        )
    }
}

/// Build the Actix application.
pub fn build_app(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        Error::invalid_request(format!("invalid request body: {err}")).into()
    });

    let api = web::scope("/api/v1")
        .service(register_user)
        .service(get_profile);

    App::new()
        .app_data(health_state)
        .app_data(http_state)
        .app_data(json_config)
        .wrap(Trace)
        .service(api)
        .service(ready)
        .service(live)
}

/// Bind the HTTP server and mark the process ready.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    http_state: HttpState,
    bind_addr: SocketAddr,
) -> std::io::Result<Server> {
    let server_health_state = health_state.clone();
    let http_state = web::Data::new(http_state);
    let server = HttpServer::new(move || build_app(server_health_state.clone(), http_state.clone()))
        .bind(bind_addr)?
        .run();

    health_state.mark_ready();
    info!(%bind_addr, "listening");
    Ok(server)
}

/// Run the reconciliation and ledger sweep every `interval`, forever.
pub async fn run_sweeps(sweep: MaintenanceSweep, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        sweep.run_once().await;
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::inbound::http::ErrorBody;
    use crate::inbound::http::registration::RegisteredUserBody;

    fn app_state() -> (web::Data<HealthState>, web::Data<HttpState>) {
        let settings = AppSettings::default();
        let services =
            build_services(Adapters::in_memory(), &settings).expect("default settings are valid");
        (
            web::Data::new(HealthState::new()),
            web::Data::new(HttpState::from(&services)),
        )
    }

    #[rstest]
    #[actix_web::test]
    async fn registers_then_reads_the_profile_end_to_end() {
        let (health, state) = app_state();
        let app = test::init_service(build_app(health, state)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/users")
            .insert_header(("Idempotency-Key", "k1"))
            .set_json(json!({
                "email": "a@x.com",
                "username": "alice",
                "password": "pw123",
                "displayAttributes": {"displayName": "Alice"}
            }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert!(res.headers().contains_key("trace-id"));
        let created: RegisteredUserBody = test::read_body_json(res).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/users/{}/profile", created.account_id))
            .to_request();
        let profile: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(profile["username"], "alice");
        assert_eq!(profile["displayAttributes"]["displayName"], "Alice");
    }

    #[rstest]
    #[actix_web::test]
    async fn malformed_json_uses_the_error_envelope() {
        let (health, state) = app_state();
        let app = test::init_service(build_app(health, state)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/users")
            .insert_header(("Idempotency-Key", "k1"))
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"email\":")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(res).await;
        assert_eq!(body.code, "invalid_request");
        assert!(body.trace_id.is_some());
    }
}
