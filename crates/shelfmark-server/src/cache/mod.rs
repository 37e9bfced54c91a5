//! Cache layer: generic backend, key namespaces, and the cache-backed
//! session store, token blacklist, and rate limiter.
//!
//! The relational store is the system of record everywhere; this layer is
//! strictly a performance tier and must never be the sole source of truth.

pub mod backend;
pub mod blacklist;
pub mod keys;
pub mod rate_limit;
pub mod session;

pub use backend::CacheBackend;
pub use blacklist::CacheTokenBlacklist;
pub use rate_limit::RateLimiter;
pub use session::CacheSessionStore;
