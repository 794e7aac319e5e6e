//! Cache Module Library
//!
//! A cache-aside wrapper for asynchronous backend services, plus the settings
//! and service interfaces it consumes.

pub mod cache;
pub mod cli;
pub mod http;
pub mod service;
pub mod settings;

pub use cache::{CacheModule, CachedData, Clock, ManualClock, SystemClock};
pub use service::Service;
pub use settings::{MemorySettings, Settings, SettingsError};
