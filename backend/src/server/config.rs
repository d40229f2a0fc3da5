//! Application settings loaded via OrthoConfig.
//!
//! Every value can come from `REGISTRATION_*` environment variables, a
//! configuration file, or command-line flags. Unset values fall back to the
//! defaults below. The ledger retention window is read separately from
//! `IDEMPOTENCY_TTL_HOURS`.

use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::idempotency::IdempotencyConfig;
use crate::domain::{MaintenanceConfig, ProfileQueryConfig, RegistrationConfig, RetryPolicy};
use crate::outbound::cache::CacheTtl;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

fn default_bind_addr() -> String {
    String::from(DEFAULT_BIND_ADDR)
}

/// Failure to interpret loaded settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid bind address {value:?}: {message}")]
    BindAddr { value: String, message: String },
    #[error("retry_max_attempts must be at least 1")]
    NoAttempts,
}

/// Configuration for the registration service binary.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "REGISTRATION")]
pub struct AppSettings {
    /// Socket address for the HTTP listener.
    #[serde(default = "default_bind_addr")]
    #[ortho_config(default = default_bind_addr())]
    pub bind_addr: String,
    /// PostgreSQL URL. Without it every store is in-memory.
    pub database_url: Option<String>,
    /// Redis URL. Without it the profile cache is in-memory.
    pub redis_url: Option<String>,
    pub store_timeout_ms: Option<u64>,
    pub cache_timeout_ms: Option<u64>,
    pub queue_timeout_ms: Option<u64>,
    pub retry_max_attempts: Option<u32>,
    pub retry_initial_backoff_ms: Option<u64>,
    pub retry_max_backoff_ms: Option<u64>,
    /// Seconds before an unfinished attempt may be taken over.
    pub in_flight_lease_secs: Option<u64>,
    /// Seconds a pending reconciliation flag is left alone.
    pub reconciliation_grace_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub cache_ttl_secs: Option<u64>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_url: None,
            redis_url: None,
            store_timeout_ms: None,
            cache_timeout_ms: None,
            queue_timeout_ms: None,
            retry_max_attempts: None,
            retry_initial_backoff_ms: None,
            retry_max_backoff_ms: None,
            in_flight_lease_secs: None,
            reconciliation_grace_secs: None,
            sweep_interval_secs: None,
            cache_ttl_secs: None,
        }
    }
}

fn millis(value: Option<u64>, default: u64) -> Duration {
    Duration::from_millis(value.unwrap_or(default))
}

fn secs(value: Option<u64>, default: u64) -> Duration {
    Duration::from_secs(value.unwrap_or(default))
}

impl AppSettings {
    /// Parsed listener address.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_str();
        raw.parse().map_err(|err: std::net::AddrParseError| SettingsError::BindAddr {
            value: raw.to_owned(),
            message: err.to_string(),
        })
    }

    pub fn store_timeout(&self) -> Duration {
        millis(self.store_timeout_ms, 2_000)
    }

    pub fn cache_timeout(&self) -> Duration {
        millis(self.cache_timeout_ms, 250)
    }

    pub fn queue_timeout(&self) -> Duration {
        millis(self.queue_timeout_ms, 250)
    }

    /// Retry bounds shared by the orchestrator and the profile reader.
    pub fn retry_policy(&self) -> Result<RetryPolicy, SettingsError> {
        let max_attempts = self.retry_max_attempts.unwrap_or(3);
        if max_attempts == 0 {
            return Err(SettingsError::NoAttempts);
        }
        Ok(RetryPolicy {
            max_attempts,
            initial_backoff: millis(self.retry_initial_backoff_ms, 50),
            max_backoff: millis(self.retry_max_backoff_ms, 1_000),
        })
    }

    /// Orchestrator settings around the given ledger retention.
    pub fn registration_config(
        &self,
        idempotency: IdempotencyConfig,
    ) -> Result<RegistrationConfig, SettingsError> {
        Ok(RegistrationConfig {
            retry: self.retry_policy()?,
            store_timeout: self.store_timeout(),
            cache_timeout: self.cache_timeout(),
            queue_timeout: self.queue_timeout(),
            idempotency: idempotency.with_in_flight_lease(secs(self.in_flight_lease_secs, 300)),
        })
    }

    pub fn profile_query_config(&self) -> Result<ProfileQueryConfig, SettingsError> {
        Ok(ProfileQueryConfig {
            retry: self.retry_policy()?,
            store_timeout: self.store_timeout(),
            cache_timeout: self.cache_timeout(),
        })
    }

    pub fn maintenance_config(&self) -> MaintenanceConfig {
        MaintenanceConfig {
            reconciliation_grace: secs(self.reconciliation_grace_secs, 300),
            store_timeout: self.store_timeout(),
            ..MaintenanceConfig::default()
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        secs(self.sweep_interval_secs, 60).max(Duration::from_secs(1))
    }

    pub fn cache_ttl(&self) -> CacheTtl {
        CacheTtl::new(secs(self.cache_ttl_secs, 3_600))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for settings parsing.

    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    use super::*;

    const VARS: [&str; 6] = [
        "REGISTRATION_BIND_ADDR",
        "REGISTRATION_DATABASE_URL",
        "REGISTRATION_REDIS_URL",
        "REGISTRATION_STORE_TIMEOUT_MS",
        "REGISTRATION_RETRY_MAX_ATTEMPTS",
        "REGISTRATION_IN_FLIGHT_LEASE_SECS",
    ];

    fn load_from_empty_args() -> AppSettings {
        AppSettings::load_from_iter([OsString::from("accounts-backend")])
            .expect("config should load")
    }

    #[rstest]
    fn defaults_are_used_when_missing() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(
            settings.bind_addr().expect("addr"),
            "0.0.0.0:8080".parse::<SocketAddr>().expect("addr")
        );
        assert!(settings.database_url.is_none());
        assert!(settings.redis_url.is_none());
        let config = settings
            .registration_config(IdempotencyConfig::default())
            .expect("config");
        assert_eq!(config, RegistrationConfig::default());
        assert_eq!(settings.sweep_interval(), Duration::from_secs(60));
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("REGISTRATION_BIND_ADDR", Some("127.0.0.1:9000".to_owned())),
            (
                "REGISTRATION_DATABASE_URL",
                Some("postgres://localhost/accounts".to_owned()),
            ),
            ("REGISTRATION_REDIS_URL", None),
            ("REGISTRATION_STORE_TIMEOUT_MS", Some("500".to_owned())),
            ("REGISTRATION_RETRY_MAX_ATTEMPTS", Some("5".to_owned())),
            ("REGISTRATION_IN_FLIGHT_LEASE_SECS", Some("30".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.bind_addr().expect("addr"),
            "127.0.0.1:9000".parse::<SocketAddr>().expect("addr")
        );
        assert_eq!(
            settings.database_url.as_deref(),
            Some("postgres://localhost/accounts")
        );
        let config = settings
            .registration_config(IdempotencyConfig::default())
            .expect("config");
        assert_eq!(config.store_timeout, Duration::from_millis(500));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.idempotency.in_flight_lease(), Duration::from_secs(30));
    }

    #[rstest]
    #[case("nonsense", None)]
    #[case(DEFAULT_BIND_ADDR, Some(0))]
    fn invalid_values_are_reported(
        #[case] bind_addr: &str,
        #[case] retry_max_attempts: Option<u32>,
    ) {
        let settings = AppSettings {
            bind_addr: bind_addr.to_owned(),
            retry_max_attempts,
            ..AppSettings::default()
        };
        let bind = settings.bind_addr();
        let retry = settings.retry_policy();
        assert!(bind.is_err() || retry.is_err());
    }
}
