//! rook storage: the cache store abstraction
//!
//! Defines [`CacheStore`], the persisted snapshot cache the orchestrator
//! reads through, and an in-memory implementation. The Postgres-backed
//! store lives in `rook-api` next to the connection pool.

pub mod cache_store;
pub mod memory;

pub use cache_store::{CacheStore, StoreResult};
pub use memory::InMemoryCacheStore;
