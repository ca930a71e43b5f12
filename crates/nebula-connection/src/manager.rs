//! Pool manager: lazily creates, caches and tears down pooled executors

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use nebula_core::{ConnectionProfile, DatabaseDriver, NebulaError, PoolConfig, ProfileStore, Result};
use nebula_drivers::DriverRegistry;
use tokio::sync::Mutex;

use crate::executor::{PoolCacheKey, PooledExecutor};

/// One cache entry. The async mutex serializes creation for its key only.
#[derive(Default)]
struct PoolSlot {
    executor: Mutex<Option<Arc<PooledExecutor>>>,
    /// Set once the slot has been removed from the map; never reused after
    retired: AtomicBool,
}

/// Owns every cached executor, keyed by `{connection_id}@{database}`.
///
/// Concurrent first access for the same key creates exactly one pool.
/// `release_all` may race with `acquire`; the worst outcome is a pool being
/// recreated after teardown, never a leaked or double-closed one.
pub struct PoolManager {
    profiles: Arc<dyn ProfileStore>,
    drivers: DriverRegistry,
    slots: DashMap<PoolCacheKey, Arc<PoolSlot>>,
    max_pool_size: Option<usize>,
}

impl PoolManager {
    pub fn new(profiles: Arc<dyn ProfileStore>, drivers: DriverRegistry) -> Self {
        Self {
            profiles,
            drivers,
            slots: DashMap::new(),
            max_pool_size: None,
        }
    }

    /// Cap every pool's max size on top of the provider defaults
    pub fn with_max_pool_size(mut self, max_size: Option<usize>) -> Self {
        self.max_pool_size = max_size.filter(|n| *n > 0);
        self
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    fn pool_config(&self, driver: &dyn DatabaseDriver, profile: &ConnectionProfile, database: &str) -> PoolConfig {
        let config = driver.configure_pool(profile, database);
        match self.max_pool_size {
            Some(cap) if cap < config.max_size() => config.with_max_size(cap),
            _ => config,
        }
    }

    /// Get the cached executor for `(connection_id, target_database)`,
    /// creating it on first use.
    ///
    /// An empty or missing target falls back to the profile's default
    /// database, then to the provider's fallback database.
    #[tracing::instrument(skip(self), fields(connection_id = %connection_id))]
    pub async fn acquire(
        &self,
        connection_id: &str,
        target_database: Option<&str>,
    ) -> Result<Arc<PooledExecutor>> {
        let profile = self
            .profiles
            .find_by_id(connection_id)
            .await?
            .ok_or_else(|| NebulaError::ConnectionNotFound(connection_id.to_string()))?;
        let driver = self.drivers.require(profile.dialect)?;
        let database = driver.resolve_database(&profile, target_database);
        let key = PoolCacheKey::new(connection_id, &database);

        loop {
            let slot = self
                .slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(PoolSlot::default()))
                .clone();

            let mut guard = slot.executor.lock().await;
            if slot.retired.load(Ordering::SeqCst) {
                // Torn down while we waited; the map already holds a fresh slot or none
                continue;
            }

            if let Some(executor) = guard.as_ref().filter(|e| !e.is_closed()) {
                tracing::debug!(key = %key, "pool cache hit");
                return Ok(Arc::clone(executor));
            }

            let config = self.pool_config(driver.as_ref(), &profile, &database);
            match PooledExecutor::open(driver.clone(), &profile, &database, config).await {
                Ok(executor) => {
                    let executor = Arc::new(executor);
                    *guard = Some(Arc::clone(&executor));
                    tracing::info!(key = %key, dialect = %profile.dialect, "pool created");
                    return Ok(executor);
                }
                Err(e) => {
                    // Retire the empty slot so waiters start over instead of
                    // filling a slot that is no longer in the map
                    slot.retired.store(true, Ordering::SeqCst);
                    self.slots.remove_if(&key, |_, current| Arc::ptr_eq(current, &slot));
                    tracing::warn!(key = %key, error = %e, "pool creation failed");
                    return Err(e);
                }
            }
        }
    }

    /// Remove and close every cached pool belonging to `connection_id`.
    ///
    /// Used when a profile is edited, disconnected or deleted. Returns the
    /// number of executors closed.
    #[tracing::instrument(skip(self), fields(connection_id = %connection_id))]
    pub async fn release_all(&self, connection_id: &str) -> usize {
        let keys: Vec<PoolCacheKey> = self
            .slots
            .iter()
            .filter(|entry| entry.key().belongs_to(connection_id))
            .map(|entry| entry.key().clone())
            .collect();

        let mut closed = 0;
        for key in keys {
            if self.retire(&key).await {
                closed += 1;
            }
        }
        if closed > 0 {
            tracing::info!(closed, "released pools for connection");
        }
        closed
    }

    async fn retire(&self, key: &PoolCacheKey) -> bool {
        let Some((_, slot)) = self.slots.remove(key) else {
            return false;
        };
        let executor = {
            let mut guard = slot.executor.lock().await;
            slot.retired.store(true, Ordering::SeqCst);
            guard.take()
        };
        match executor {
            Some(executor) => {
                executor.close().await;
                true
            }
            None => false,
        }
    }

    /// Build an un-cached executor for a one-shot connectivity test.
    ///
    /// The caller must close it on every exit path; prefer `with_temporary`.
    #[tracing::instrument(skip(self, profile), fields(connection_id = %profile.id))]
    pub async fn create_temporary(&self, profile: &ConnectionProfile) -> Result<PooledExecutor> {
        let driver = self.drivers.require(profile.dialect)?;
        let database = driver.resolve_database(profile, None);
        let config = self
            .pool_config(driver.as_ref(), profile, &database)
            .with_name(format!("nebula-test-{}@{}", profile.id, database))
            .with_max_size(1);
        PooledExecutor::open(driver, profile, &database, config).await
    }

    /// Run `f` against a temporary executor and close it afterwards,
    /// whether `f` succeeded or not.
    pub async fn with_temporary<T, F, Fut>(&self, profile: &ConnectionProfile, f: F) -> Result<T>
    where
        F: FnOnce(Arc<PooledExecutor>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let executor = Arc::new(self.create_temporary(profile).await?);
        let result = f(Arc::clone(&executor)).await;
        executor.close().await;
        result
    }

    /// Number of cached, open executors
    pub fn cached_pool_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .executor
                    .try_lock()
                    .map(|guard| guard.as_ref().is_some_and(|e| !e.is_closed()))
                    .unwrap_or(true)
            })
            .count()
    }

    /// Close every cached executor. The manager stays usable afterwards.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        let keys: Vec<PoolCacheKey> = self.slots.iter().map(|entry| entry.key().clone()).collect();
        let mut closed = 0;
        for key in keys {
            if self.retire(&key).await {
                closed += 1;
            }
        }
        tracing::info!(closed, "pool manager shut down");
    }
}
