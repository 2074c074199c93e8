//! Two-tier response cache with TTL expiry and LRU eviction.
//!
//! The request client owns two independently configured [`CacheStore`]
//! instances: a short-term tier (5 minute TTL, 100 entries) for request-scoped
//! data and a long-term tier (30 minute TTL, 50 entries) for data that rarely
//! changes. Nothing is shared between the tiers except the [`CacheKey`]
//! format.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheStore`] | TTL + LRU store with optional durable persistence |
//! | [`CacheConfig`] | Per-store configuration (TTL, capacity, sweep interval) |
//! | [`CacheStats`] | Scan-time expiry figures plus genuine hit/miss counters |
//! | [`CacheKey`] | Deterministic method + URL + body fingerprint |
//! | [`Persistence`] | Trait for durable mirrors ([`JsonFilePersistence`], [`NullPersistence`]) |
//!
//! Persistence is best-effort by contract: the cache is a performance
//! optimization, never a correctness dependency, so backend failures are
//! logged and degrade to a miss or no-op.

mod key;
mod persist;
mod store;

pub use key::CacheKey;
pub use persist::{JsonFilePersistence, NullPersistence, PersistedEntry, Persistence};
pub use store::{CacheConfig, CacheStats, CacheStore, WarmupOptions};
