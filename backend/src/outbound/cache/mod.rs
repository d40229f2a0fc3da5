//! Profile cache adapters.
//!
//! The Redis adapter pools connections with `bb8-redis`. Callers treat every
//! cache error as a miss, so the adapter reports failures without retrying.

mod redis_profile_cache;

pub use redis_profile_cache::{CacheTtl, RedisProfileCache, profile_key};
