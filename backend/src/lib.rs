//! Account registration backend.
//!
//! The crate is laid out hexagonally: [`domain`] holds the use cases and the
//! ports they depend on, [`outbound`] implements those ports for PostgreSQL,
//! Redis, and in-process stores, and [`inbound`] exposes the use cases over
//! HTTP behind the [`middleware`] request tracing. [`server`] wires everything
//! together for the binary.

pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod server;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
