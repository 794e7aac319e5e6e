//! Cache-aside wrapper around a backend service
//!
//! A `CacheModule` answers `ensure_available` from memory while the stored
//! record is fresh, and otherwise calls the backend, stores the processed
//! result and returns it. Backend failures are returned untouched and never
//! stored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::store::{Record, RecordStore};
use crate::service::Service;
use crate::settings::Settings;

/// Settings namespace shared by all caches
pub const SETTINGS_NAMESPACE: &str = "cacheModules";

/// Settings path holding per-cache expiration durations
pub const EXPIRATION_PATH: &str = "cacheModules.expiration";

/// Expiration registered as the namespace default (30 minutes)
pub const DEFAULT_EXPIRATION_MS: u64 = 1_800_000;

/// Service method invoked when none is configured
pub const DEFAULT_METHOD: &str = "call";

/// Key used for every request unless a key function is configured
pub const DEFAULT_CACHE_KEY: &str = "default";

type KeyFn<P> = Box<dyn Fn(&P) -> String + Send + Sync>;
type ProcessFn<T> = Box<dyn Fn(T) -> T + Send + Sync>;

/// Snapshot of a cached record, including metadata about its freshness
#[derive(Debug, Clone, PartialEq)]
pub struct CachedData<T> {
    /// The cached data
    pub data: T,
    /// Time elapsed since the data was stored
    pub age: Duration,
    /// Whether the record is past its expiration
    pub is_expired: bool,
}

/// Cache-aside wrapper for a single backend method
///
/// By default every request maps to one key, so the cache holds a single
/// value. Use [`CacheModule::with_key_fn`] to derive keys from the request
/// parameters.
///
/// Concurrent misses on the same key each call the backend unless
/// [`CacheModule::coalesce_misses`] is enabled.
pub struct CacheModule<P, S>
where
    S: Service<P>,
{
    name: String,
    method: String,
    settings: Arc<dyn Settings>,
    service: Arc<S>,
    store: RecordStore<S::Output>,
    key_fn: KeyFn<P>,
    clock: Arc<dyn Clock>,
    processor: ProcessFn<S::Output>,
    coalesce: bool,
    gates: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<P, S> CacheModule<P, S>
where
    S: Service<P>,
    S::Output: Clone + Send + 'static,
{
    /// Creates a cache named `name` in front of `service`
    ///
    /// Registers the default expiration under the `cacheModules` namespace
    /// of `settings` if it is not already configured, and spawns the record
    /// store task.
    ///
    /// # Panics
    /// Panics if called outside of a tokio runtime.
    pub fn new(settings: Arc<dyn Settings>, name: impl Into<String>, service: Arc<S>) -> Self {
        settings.init(
            SETTINGS_NAMESPACE,
            json!({ "expiration": { "default": DEFAULT_EXPIRATION_MS } }),
        );

        Self {
            name: name.into(),
            method: DEFAULT_METHOD.to_string(),
            settings,
            service,
            store: RecordStore::spawn(),
            key_fn: Box::new(|_: &P| DEFAULT_CACHE_KEY.to_string()),
            clock: Arc::new(SystemClock),
            processor: Box::new(|data| data),
            coalesce: false,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Invokes `method` on the service instead of `call`
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Derives cache keys from request parameters with `key_fn`
    pub fn with_key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&P) -> String + Send + Sync + 'static,
    {
        self.key_fn = Box::new(key_fn);
        self
    }

    /// Reads the current time from `clock`
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Transforms each fresh backend result with `processor` before storing it
    pub fn with_processor<F>(mut self, processor: F) -> Self
    where
        F: Fn(S::Output) -> S::Output + Send + Sync + 'static,
    {
        self.processor = Box::new(processor);
        self
    }

    /// Collapses concurrent misses on the same key into one backend call
    ///
    /// Callers for a key queue behind whichever caller is fetching it, then
    /// re-check the cache. A failed fetch is not shared: the next caller in
    /// line makes its own attempt.
    pub fn coalesce_misses(mut self, enabled: bool) -> Self {
        self.coalesce = enabled;
        self
    }

    /// Display name used in log lines and for the expiration setting
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Service method this cache invokes
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Derives the cache key for `params`
    pub fn cache_key(&self, params: &P) -> String {
        (self.key_fn)(params)
    }

    /// Current time reading
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Applies the configured transform to raw backend output
    pub fn process_data(&self, data: S::Output) -> S::Output {
        (self.processor)(data)
    }

    /// Resolves how long records of this cache stay fresh
    ///
    /// Reads `cacheModules.expiration.<name>`, falling back to
    /// `cacheModules.expiration.default`. `None` means records never expire.
    pub fn expiration(&self) -> Option<Duration> {
        let expirations = self.settings.get(EXPIRATION_PATH, json!({}));
        let value = expirations
            .get(&self.name)
            .or_else(|| expirations.get("default"))
            .unwrap_or(&Value::Null);
        self.parse_expiration(value)
    }

    fn parse_expiration(&self, value: &Value) -> Option<Duration> {
        let ms = match value {
            Value::Null => return None,
            Value::Number(n) => {
                if let Some(ms) = n.as_u64() {
                    return Some(Duration::from_millis(ms));
                }
                n.as_f64()
            }
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match ms {
            Some(ms) if ms.is_nan() => None,
            Some(ms) if ms <= 0.0 => Some(Duration::ZERO),
            // Too large for a Duration, so effectively never expires
            Some(ms) => Some(Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX)),
            None => {
                warn!(
                    "[{}] Ignoring non-numeric expiration setting: {}",
                    self.name, value
                );
                None
            }
        }
    }

    /// Stores `data` under `key`, stamped with the current time
    pub async fn store_data(&self, key: &str, data: S::Output) {
        let now = self.now();
        self.store.put(key, data, now).await;
    }

    /// Removes cached records
    ///
    /// With `Some(key)`, removes only that key's record; clearing a key that
    /// holds no record does nothing. With `None`, removes every record.
    pub async fn clear_cache(&self, key: Option<&str>) {
        match key {
            Some(key) => self.store.remove(key).await,
            None => self.store.clear().await,
        }
    }

    /// Returns a snapshot of the record stored under `key`, without fetching
    pub async fn peek(&self, key: &str) -> Option<CachedData<S::Output>> {
        let record = self.store.get(key).await?;
        let now = self.now();
        let is_expired = !is_fresh(&record, now, self.expiration());
        Some(CachedData {
            age: now.saturating_duration_since(record.stored_at),
            data: record.value,
            is_expired,
        })
    }

    /// Returns the value for `params`, from cache when fresh or from the service
    ///
    /// # Returns
    /// * `Ok(value)` - The cached value, or the processed result of a fresh fetch
    /// * `Err(error)` - The service's failure, unchanged; nothing is stored
    pub async fn ensure_available(&self, params: &P) -> Result<S::Output, S::Error> {
        debug!("[{}] Checking data availability...", self.name);
        let key = self.cache_key(params);

        if !self.coalesce {
            return self.lookup_or_fetch(&key, params).await;
        }

        let gate = self.acquire_gate(&key);
        let _turn = gate.wait_turn().await;
        self.lookup_or_fetch(&key, params).await
    }

    async fn lookup_or_fetch(&self, key: &str, params: &P) -> Result<S::Output, S::Error> {
        let expiration = self.expiration();
        let now = self.now();

        if let Some(record) = self.store.get(key).await {
            if is_fresh(&record, now, expiration) {
                debug!("[{}] Returning data from cache.", self.name);
                return Ok(record.value);
            }
        }

        info!("[{}] Retrieving data from service...", self.name);
        match self.service.call(&self.method, params).await {
            Ok(raw) => {
                let data = self.process_data(raw);
                self.store_data(key, data.clone()).await;
                info!("[{}] Stored and returning data from service.", self.name);
                Ok(data)
            }
            Err(error) => {
                warn!("[{}] Error retrieving data from service.", self.name);
                Err(error)
            }
        }
    }

    fn acquire_gate(&self, key: &str) -> GateGuard<'_> {
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        let gate = gates.entry(key.to_string()).or_default().clone();
        GateGuard {
            gates: &self.gates,
            key: key.to_string(),
            gate: Some(gate),
        }
    }
}

/// Holds a caller's place in a per-key gate
///
/// Dropping the guard, including when the caller's future is cancelled,
/// removes the map entry once no other caller references it.
struct GateGuard<'a> {
    gates: &'a Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    key: String,
    gate: Option<Arc<AsyncMutex<()>>>,
}

impl GateGuard<'_> {
    /// Waits until no other caller holds the gate
    async fn wait_turn(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        // Release our reference under the map lock so counts stay consistent
        drop(self.gate.take());
        if gates.get(&self.key).is_some_and(|g| Arc::strong_count(g) == 1) {
            gates.remove(&self.key);
        }
    }
}

/// A record is fresh when no expiration is set or it is younger than the expiration
fn is_fresh<T>(record: &Record<T>, now: Instant, expiration: Option<Duration>) -> bool {
    expiration.map_or(true, |ttl| now.saturating_duration_since(record.stored_at) < ttl)
}
