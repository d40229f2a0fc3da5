//! Backend entry-point: loads settings, wires adapters, starts the HTTP
//! server and the maintenance sweep.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use actix_web::web;
use color_eyre::eyre::{Context, Result};
use ortho_config::OrthoConfig;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use accounts_backend::inbound::http::health::HealthState;
use accounts_backend::inbound::http::state::HttpState;
use accounts_backend::server::{
    AppSettings, build_adapters, build_services, create_server, run_sweeps,
};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load().wrap_err("load settings")?;
    let bind_addr = settings.bind_addr()?;
    let adapters = build_adapters(&settings)
        .await
        .wrap_err("connect backends")?;
    let services = build_services(adapters, &settings)?;

    let sweeper = tokio::spawn(run_sweeps(services.sweep.clone(), settings.sweep_interval()));

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state.clone(), HttpState::from(&services), bind_addr)
        .wrap_err_with(|| format!("bind {bind_addr}"))?;
    let result = server.await.wrap_err("run HTTP server");

    health_state.mark_unhealthy();
    sweeper.abort();
    result
}
