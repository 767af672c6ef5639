//! Background Jobs for the rook API
//!
//! - `cache_sweep`: Deletes expired cache rows on a fixed interval
//!
//! # Usage
//!
//! ```ignore
//! use rook_api::jobs::{cache_sweep_task, CacheSweepConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(cache_sweep_task(store, CacheSweepConfig::default(), None, shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod cache_sweep;

pub use cache_sweep::{
    cache_sweep_task, sweep_once, CacheSweepConfig, CacheSweepMetrics, CacheSweepSnapshot,
};
