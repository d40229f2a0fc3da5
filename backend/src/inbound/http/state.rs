//! Shared HTTP adapter state.
//!
//! Handlers receive this via `actix_web::web::Data` and depend only on the
//! driving ports, so they can be tested with mocks.

use std::sync::Arc;

use crate::domain::ports::{AccountRegistration, ProfileQuery};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub registration: Arc<dyn AccountRegistration>,
    pub profiles: Arc<dyn ProfileQuery>,
}

impl HttpState {
    /// Bundle the use-case ports.
    pub fn new(registration: Arc<dyn AccountRegistration>, profiles: Arc<dyn ProfileQuery>) -> Self {
        Self {
            registration,
            profiles,
        }
    }
}
