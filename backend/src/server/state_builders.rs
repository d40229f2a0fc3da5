//! Adapter selection and service construction.
//!
//! PostgreSQL-backed adapters are used when a database URL is configured and
//! Redis backs the cache when a Redis URL is configured. Anything left
//! unconfigured falls back to the in-memory adapters.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tracing::{info, warn};

use crate::domain::idempotency::IdempotencyConfig;
use crate::domain::ports::{
    CredentialStore, JobQueue, ProfileCache, ProfileStore, ReconciliationLog, RegistrationLedger,
};
use crate::domain::{MaintenanceSweep, ProfileQueryService, RegistrationPorts, RegistrationService};
use crate::outbound::cache::RedisProfileCache;
use crate::outbound::crypto::Argon2PasswordHasher;
use crate::outbound::memory::{
    DEFAULT_QUEUE_CAPACITY, MemoryCredentialStore, MemoryJobQueue, MemoryProfileCache,
    MemoryProfileStore, MemoryReconciliationLog, MemoryRegistrationLedger,
};
use crate::outbound::persistence::{
    DbPool, DieselCredentialStore, DieselJobOutbox, DieselProfileStore, DieselReconciliationLog,
    DieselRegistrationLedger, PoolConfig, run_pending_migrations,
};

use super::StartupError;
use super::config::AppSettings;

/// Driven adapters chosen for this process.
#[derive(Clone)]
pub struct Adapters {
    pub credentials: Arc<dyn CredentialStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub cache: Arc<dyn ProfileCache>,
    pub jobs: Arc<dyn JobQueue>,
    pub ledger: Arc<dyn RegistrationLedger>,
    pub reconciliation: Arc<dyn ReconciliationLog>,
}

impl Adapters {
    /// Every port backed by process memory.
    pub fn in_memory() -> Self {
        Self {
            credentials: Arc::new(MemoryCredentialStore::new()),
            profiles: Arc::new(MemoryProfileStore::new()),
            cache: Arc::new(MemoryProfileCache::new()),
            jobs: Arc::new(MemoryJobQueue::new()),
            ledger: Arc::new(MemoryRegistrationLedger::new()),
            reconciliation: Arc::new(MemoryReconciliationLog::new()),
        }
    }

    fn with_database(pool: &DbPool, cache: Arc<dyn ProfileCache>) -> Self {
        Self {
            credentials: Arc::new(DieselCredentialStore::new(pool.clone())),
            profiles: Arc::new(DieselProfileStore::new(pool.clone())),
            cache,
            jobs: Arc::new(DieselJobOutbox::new(pool.clone())),
            ledger: Arc::new(DieselRegistrationLedger::new(pool.clone())),
            reconciliation: Arc::new(DieselReconciliationLog::new(pool.clone())),
        }
    }
}

/// Connect to the configured backends, running migrations first.
pub async fn build_adapters(settings: &AppSettings) -> Result<Adapters, StartupError> {
    let cache: Arc<dyn ProfileCache> = match settings.redis_url.as_deref() {
        Some(url) => {
            let cache =
                RedisProfileCache::connect(url, settings.cache_ttl(), settings.store_timeout())
                    .await?;
            info!("using Redis profile cache");
            Arc::new(cache)
        }
        None => {
            warn!("no Redis URL configured; using an in-process profile cache");
            Arc::new(MemoryProfileCache::new())
        }
    };

    let Some(database_url) = settings.database_url.as_deref() else {
        warn!("no database URL configured; all stores are in-memory and lost on restart");
        warn!(
            capacity = DEFAULT_QUEUE_CAPACITY,
            "side-effect jobs are kept in memory and never delivered; the oldest are dropped \
             once the queue is full"
        );
        return Ok(Adapters {
            cache,
            ..Adapters::in_memory()
        });
    };

    run_pending_migrations(database_url).await?;
    let pool = DbPool::new(
        PoolConfig::new(database_url).with_connection_timeout(settings.store_timeout()),
    )
    .await?;
    info!("using PostgreSQL stores");
    Ok(Adapters::with_database(&pool, cache))
}

/// Use cases built over one set of adapters.
#[derive(Clone)]
pub struct Services {
    pub registration: RegistrationService,
    pub profiles: ProfileQueryService,
    pub sweep: MaintenanceSweep,
}

/// Wire the use cases with the system clock and Argon2id hashing.
pub fn build_services(adapters: Adapters, settings: &AppSettings) -> Result<Services, StartupError> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let registration = RegistrationService::new(
        RegistrationPorts {
            credentials: Arc::clone(&adapters.credentials),
            profiles: Arc::clone(&adapters.profiles),
            cache: Arc::clone(&adapters.cache),
            jobs: adapters.jobs,
            ledger: Arc::clone(&adapters.ledger),
            reconciliation: Arc::clone(&adapters.reconciliation),
            hasher: Arc::new(Argon2PasswordHasher::new()),
        },
        Arc::clone(&clock),
        settings.registration_config(IdempotencyConfig::from_env())?,
    );
    let profiles = ProfileQueryService::new(
        Arc::clone(&adapters.profiles),
        adapters.cache,
        Arc::clone(&clock),
        settings.profile_query_config()?,
    );
    let sweep = MaintenanceSweep::new(
        adapters.credentials,
        adapters.profiles,
        adapters.reconciliation,
        adapters.ledger,
        clock,
        settings.maintenance_config(),
    );
    Ok(Services {
        registration,
        profiles,
        sweep,
    })
}
