//! Driving port for the register-user use case.
//!
//! Inbound adapters depend on this port rather than on the orchestrator so
//! handlers can be exercised with mocks.

use async_trait::async_trait;

use crate::domain::registration::{RegistrationError, RegistrationReceipt, RegistrationRequest};

/// Domain use-case port for account registration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRegistration: Send + Sync {
    /// Register a new account, replaying the stored outcome for a known key.
    async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationReceipt, RegistrationError>;
}
