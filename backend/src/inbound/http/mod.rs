//! HTTP inbound adapter exposing REST endpoints.
//!
//! ```text
//! POST /api/v1/users
//! GET  /api/v1/users/{accountId}/profile
//! GET  /health/live
//! GET  /health/ready
//! ```

pub mod error;
pub mod health;
pub mod idempotency;
pub mod profiles;
pub mod registration;
pub mod state;

pub use error::{ApiResult, ErrorBody};
