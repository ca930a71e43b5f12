//! Common test utilities and mocks

use async_trait::async_trait;
use nebula_core::{
    Connection, ConnectionProfile, DatabaseDriver, Dialect, InMemoryProfileStore, NebulaError,
    QueryResult, Result, StatementResult, Value,
};
use nebula_drivers::DriverRegistry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Counters shared between a mock driver and the connections it opens
#[derive(Default)]
pub struct DriverStats {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub queries: AtomicUsize,
    pub statements: AtomicUsize,
}

impl DriverStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> usize {
        self.statements.load(Ordering::SeqCst)
    }
}

pub struct MockConnection {
    stats: Arc<DriverStats>,
    closed: AtomicBool,
    affected_rows: u64,
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<StatementResult> {
        self.stats.statements.fetch_add(1, Ordering::SeqCst);
        Ok(StatementResult {
            affected_rows: self.affected_rows,
        })
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.stats.queries.fetch_add(1, Ordering::SeqCst);
        Ok(QueryResult::from_rows(&["?column?"], vec![vec![Value::Int32(1)]]))
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.stats.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Mock PostgreSQL-flavored driver that counts pool constructions.
///
/// Every pool opens exactly one connection during its warm-up checkout, so
/// `connects` equals the number of pools built.
pub struct MockDriver {
    pub stats: Arc<DriverStats>,
    /// Passwords equal to this value are rejected
    pub bad_password: Option<String>,
    pub connect_delay: Duration,
    /// Reported by every `execute`
    pub affected_rows: u64,
    pub fallback_database: Option<&'static str>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(DriverStats::default()),
            bad_password: None,
            connect_delay: Duration::ZERO,
            affected_rows: 1,
            fallback_database: None,
        }
    }

    pub fn rejecting(mut self, password: &str) -> Self {
        self.bad_password = Some(password.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn with_affected_rows(mut self, rows: u64) -> Self {
        self.affected_rows = rows;
        self
    }

    pub fn with_fallback_database(mut self, database: &'static str) -> Self {
        self.fallback_database = Some(database);
        self
    }
}

#[async_trait]
impl DatabaseDriver for MockDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn build_url(&self, profile: &ConnectionProfile, database: &str) -> String {
        format!("mock://{}/{}", profile.host, database)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn fallback_database(&self) -> Option<&'static str> {
        self.fallback_database
    }

    async fn connect(
        &self,
        profile: &ConnectionProfile,
        _database: &str,
    ) -> Result<Arc<dyn Connection>> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if self.bad_password.is_some() && profile.password == self.bad_password {
            return Err(NebulaError::Connection(format!(
                "password authentication failed for user \"{}\"",
                profile.username.as_deref().unwrap_or_default()
            )));
        }
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection {
            stats: Arc::clone(&self.stats),
            closed: AtomicBool::new(false),
            affected_rows: self.affected_rows,
        }))
    }
}

pub fn profile(id: &str) -> ConnectionProfile {
    ConnectionProfile::new(id, Dialect::Postgres)
        .with_host("db.test", 5432)
        .with_database("sales")
        .with_credentials("app", "secret")
}

pub fn registry(driver: MockDriver) -> (DriverRegistry, Arc<DriverStats>) {
    let stats = Arc::clone(&driver.stats);
    let mut registry = DriverRegistry::new();
    registry.register(Arc::new(driver));
    (registry, stats)
}

pub fn store(profiles: Vec<ConnectionProfile>) -> Arc<InMemoryProfileStore> {
    Arc::new(InMemoryProfileStore::from_profiles(profiles))
}
