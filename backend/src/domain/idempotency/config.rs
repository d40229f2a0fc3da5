//! Environment-driven configuration for the registration ledger.

use std::time::Duration;

/// Environment variable name for the ledger retention window.
pub const IDEMPOTENCY_TTL_HOURS_ENV: &str = "IDEMPOTENCY_TTL_HOURS";

/// Environment abstraction for idempotency configuration lookups.
///
/// Tests supply a map-backed implementation instead of mutating the process
/// environment.
pub trait IdempotencyEnv {
    /// Fetch a string value by name.
    fn string(&self, name: &str) -> Option<String>;
}

/// Environment access backed by the real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultIdempotencyEnv;

impl IdempotencyEnv for DefaultIdempotencyEnv {
    fn string(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Retention and lease settings for ledger entries.
///
/// # Example
///
/// ```
/// # use accounts_backend::domain::idempotency::IdempotencyConfig;
/// # use std::time::Duration;
/// let config = IdempotencyConfig::default();
/// assert_eq!(config.ttl(), Duration::from_secs(24 * 3600));
/// assert_eq!(config.in_flight_lease(), Duration::from_secs(300));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyConfig {
    ttl: Duration,
    in_flight_lease: Duration,
}

impl IdempotencyConfig {
    const DEFAULT_TTL_HOURS: u64 = 24;
    const MIN_TTL_HOURS: u64 = 1;
    /// Ten years.
    const MAX_TTL_HOURS: u64 = 24 * 365 * 10;
    const DEFAULT_IN_FLIGHT_LEASE: Duration = Duration::from_secs(5 * 60);

    /// Load configuration from the real process environment.
    pub fn from_env() -> Self {
        Self::from_env_with(&DefaultIdempotencyEnv)
    }

    /// Load configuration from a custom environment source.
    ///
    /// `IDEMPOTENCY_TTL_HOURS` defaults to 24 and is clamped to `[1, 87600]`.
    /// Unparseable values fall back to the default.
    pub fn from_env_with(env: &impl IdempotencyEnv) -> Self {
        let hours = env
            .string(IDEMPOTENCY_TTL_HOURS_ENV)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(Self::DEFAULT_TTL_HOURS)
            .clamp(Self::MIN_TTL_HOURS, Self::MAX_TTL_HOURS);
        Self {
            ttl: Duration::from_secs(hours.saturating_mul(3600)),
            in_flight_lease: Self::DEFAULT_IN_FLIGHT_LEASE,
        }
    }

    /// Create with an explicit TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            in_flight_lease: Self::DEFAULT_IN_FLIGHT_LEASE,
        }
    }

    /// Override how long an in-flight marker is honoured before takeover.
    #[must_use]
    pub fn with_in_flight_lease(mut self, lease: Duration) -> Self {
        self.in_flight_lease = lease;
        self
    }

    /// Retention window for ledger entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Lease after which an in-flight marker counts as abandoned.
    pub fn in_flight_lease(&self) -> Duration {
        self.in_flight_lease
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(Self::DEFAULT_TTL_HOURS * 3600))
    }
}
