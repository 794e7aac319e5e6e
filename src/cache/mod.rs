//! Cache module for shielding slow backends behind an in-memory cache
//!
//! This module provides `CacheModule`, a cache-aside wrapper that serves
//! repeated requests from memory until a configurable expiration elapses and
//! re-fetches from the backend on a miss. Records live in a store owned by a
//! single background task.

mod clock;
mod module;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use module::{
    CacheModule, CachedData, DEFAULT_CACHE_KEY, DEFAULT_EXPIRATION_MS, DEFAULT_METHOD,
    EXPIRATION_PATH, SETTINGS_NAMESPACE,
};
pub use store::{Record, RecordStore};
