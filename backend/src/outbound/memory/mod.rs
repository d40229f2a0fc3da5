//! In-process adapters for every driven port.
//!
//! These back the binary when no database or Redis URL is configured and give
//! behaviour tests real store semantics (uniqueness, atomic ledger claims)
//! without external services. State lives behind `std::sync::Mutex`; a
//! poisoned lock surfaces as the port's `Query` (or equivalent) error.
//!
//! The stores expose small failure switches so tests can simulate outages.
//! The cache and the job queue are bounded; nothing drains the queue.

mod cache;
mod jobs;
mod ledger;
mod reconciliation;
mod stores;

use std::sync::{Mutex, MutexGuard};

pub use cache::{DEFAULT_CACHE_CAPACITY, MemoryProfileCache};
pub use jobs::{DEFAULT_QUEUE_CAPACITY, MemoryJobQueue};
pub use ledger::MemoryRegistrationLedger;
pub use reconciliation::MemoryReconciliationLog;
pub use stores::{MemoryCredentialStore, MemoryProfileStore};

/// Lock `mutex`, mapping poisoning through `on_poison`.
fn guard<'a, T, E>(
    mutex: &'a Mutex<T>,
    on_poison: impl FnOnce(String) -> E,
) -> Result<MutexGuard<'a, T>, E> {
    mutex
        .lock()
        .map_err(|err| on_poison(format!("state lock poisoned: {err}")))
}
