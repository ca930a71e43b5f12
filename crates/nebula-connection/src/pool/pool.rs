//! Connection pool implementation

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use nebula_core::{Connection, NebulaError, PoolConfig, Result};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::stats::PoolStats;

/// Factory trait for creating new connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Create a new connection
    async fn create(&self) -> Result<Arc<dyn Connection>>;

    /// Validate that an idle connection is still usable before handing it out
    async fn validate(&self, conn: &dyn Connection) -> bool {
        !conn.is_closed()
    }
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        (**self).create().await
    }

    async fn validate(&self, conn: &dyn Connection) -> bool {
        (**self).validate(conn).await
    }
}

/// Idle connection with the timestamps used for recycling
struct IdleConnection {
    connection: Arc<dyn Connection>,
    created_at: Instant,
    last_used_at: Instant,
}

/// Decrements the waiting counter on every exit path of `get`
struct WaitingGuard<'a>(&'a AtomicUsize);

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Close a connection from a synchronous context
fn close_detached(connection: Arc<dyn Connection>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = connection.close().await {
                    tracing::debug!(error = %e, "error closing pooled connection");
                }
            });
        }
        Err(_) => tracing::debug!("no runtime available, dropping pooled connection"),
    }
}

/// A bounded pool of database connections
///
/// Connections are automatically returned to the pool when the
/// `PooledConnection` wrapper is dropped. After `close()` the pool refuses
/// new checkouts and closes connections as they come back.
pub struct ConnectionPool {
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    idle: Mutex<VecDeque<IdleConnection>>,
    /// Limits total live connections
    semaphore: Arc<Semaphore>,
    active_count: AtomicUsize,
    waiting_count: AtomicUsize,
    created_count: AtomicU64,
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Create a new connection pool with the given configuration and factory.
    ///
    /// No connection is opened until the first `get`.
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_size()));
        Self {
            config,
            factory: Arc::new(factory),
            idle: Mutex::new(VecDeque::new()),
            semaphore,
            active_count: AtomicUsize::new(0),
            waiting_count: AtomicUsize::new(0),
            created_count: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Get a connection from the pool
    ///
    /// This will:
    /// 1. Try to get a valid idle connection from the pool
    /// 2. If none available and under max_size, create a new connection
    /// 3. If at max_size, wait for a connection to be returned (with timeout)
    ///
    /// Returns an error if the pool is closed or the acquire timeout is exceeded.
    pub async fn get(&self) -> Result<PooledConnection<'_>> {
        if self.is_closed() {
            return Err(NebulaError::Connection(format!("Pool {} is closed", self.config.name())));
        }

        self.waiting_count.fetch_add(1, Ordering::SeqCst);
        let _waiting = WaitingGuard(&self.waiting_count);

        let checkout = async {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| NebulaError::Connection(format!("Pool {} is closed", self.config.name())))?;

            let (connection, created_at) = match self.try_get_idle().await {
                Some(idle) => idle,
                None => {
                    let connection = self.factory.create().await?;
                    self.created_count.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!(pool = %self.config.name(), "opened new pooled connection");
                    (connection, Instant::now())
                }
            };

            self.active_count.fetch_add(1, Ordering::SeqCst);
            Ok(PooledConnection {
                connection,
                created_at,
                pool: self,
                _permit: permit,
            })
        };

        match tokio::time::timeout(self.config.acquire_timeout(), checkout).await {
            Ok(result) => result,
            Err(_) => Err(NebulaError::Timeout(format!(
                "Timed out waiting for connection from {} (timeout: {:?})",
                self.config.name(),
                self.config.acquire_timeout()
            ))),
        }
    }

    /// Pop idle connections until one passes lifetime, idle and validation checks
    async fn try_get_idle(&self) -> Option<(Arc<dyn Connection>, Instant)> {
        loop {
            let inner = { self.idle.lock().pop_front() }?;

            let too_old = self
                .config
                .max_lifetime()
                .is_some_and(|max| inner.created_at.elapsed() > max);
            let too_idle = inner.last_used_at.elapsed() > self.config.idle_timeout();

            if too_old || too_idle || !self.factory.validate(&*inner.connection).await {
                tracing::debug!(pool = %self.config.name(), too_old, too_idle, "recycling pooled connection");
                let _ = inner.connection.close().await;
                continue;
            }

            return Some((inner.connection, inner.created_at));
        }
    }

    /// Return a connection to the pool
    fn return_connection(&self, connection: Arc<dyn Connection>, created_at: Instant) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);

        if connection.is_closed() {
            return;
        }
        if self.is_closed() {
            close_detached(connection);
            return;
        }

        self.idle.lock().push_back(IdleConnection {
            connection,
            created_at,
            last_used_at: Instant::now(),
        });
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active: self.active_count.load(Ordering::SeqCst),
            idle: self.idle.lock().len(),
            waiting: self.waiting_count.load(Ordering::SeqCst),
            max_size: self.config.max_size(),
            created: self.created_count.load(Ordering::SeqCst),
            closed: self.is_closed(),
        }
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Close all idle connections in the pool
    pub async fn close_idle(&self) {
        let connections: Vec<_> = { self.idle.lock().drain(..).collect() };

        for inner in connections {
            let _ = inner.connection.close().await;
        }
    }

    /// Refuse further checkouts and close idle connections.
    ///
    /// Connections still checked out are closed when they are returned.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.semaphore.close();
        self.close_idle().await;
        tracing::debug!(pool = %self.config.name(), "connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A connection borrowed from the pool
///
/// When dropped, the connection is automatically returned to the pool.
pub struct PooledConnection<'a> {
    connection: Arc<dyn Connection>,
    created_at: Instant,
    pool: &'a ConnectionPool,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection<'_> {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        self.pool
            .return_connection(Arc::clone(&self.connection), self.created_at);
    }
}

impl PooledConnection<'_> {
    /// Get the underlying connection as an Arc
    pub fn inner(&self) -> &Arc<dyn Connection> {
        &self.connection
    }
}
