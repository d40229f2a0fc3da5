//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL stores, ledger, reconciliation log and job
//!   outbox using Diesel ORM
//! - **cache**: Redis-backed profile cache
//! - **crypto**: Argon2id password hashing
//! - **memory**: in-process implementations of every port
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod cache;
pub mod crypto;
pub mod memory;
pub mod persistence;
