//! Scripted driver for tree expansion tests

#![allow(dead_code)]

use async_trait::async_trait;
use nebula_core::{
    Connection, ConnectionProfile, DatabaseDriver, Dialect, InMemoryProfileStore, NebulaError,
    QueryResult, Result, StatementResult, Value,
};
use nebula_drivers::DriverRegistry;
use nebula_tree::{TemplateRegistry, TreeService};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const VALIDATION_QUERY: &str = "SELECT 1";

/// A statement the spy driver saw, validation queries excluded
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub database: String,
    pub sql: String,
    pub params: Vec<Value>,
}

enum Reply {
    Rows(QueryResult),
    Fail(String),
}

/// Replies keyed by a substring of the SQL; the first match wins
#[derive(Default)]
pub struct Script {
    replies: Vec<(String, Reply)>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(mut self, pattern: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.replies.push((
            pattern.to_string(),
            Reply::Rows(QueryResult::from_rows(columns, rows)),
        ));
        self
    }

    /// One `name` column with the given values
    pub fn names(self, pattern: &str, names: &[&str]) -> Self {
        let rows = names.iter().map(|n| vec![Value::from(*n)]).collect();
        self.rows(pattern, &["name"], rows)
    }

    pub fn fail(mut self, pattern: &str, message: &str) -> Self {
        self.replies
            .push((pattern.to_string(), Reply::Fail(message.to_string())));
        self
    }

    fn reply(&self, sql: &str) -> Result<QueryResult> {
        match self.replies.iter().find(|(pattern, _)| sql.contains(pattern.as_str())) {
            Some((_, Reply::Rows(result))) => Ok(result.clone()),
            Some((_, Reply::Fail(message))) => Err(NebulaError::Query(message.clone())),
            None => Ok(QueryResult::empty()),
        }
    }
}

#[derive(Default)]
pub struct Spy {
    pub connects: AtomicUsize,
    queries: Mutex<Vec<RecordedQuery>>,
}

impl Spy {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<RecordedQuery> {
        self.queries.lock().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }
}

struct SpyConnection {
    database: String,
    script: Arc<Script>,
    spy: Arc<Spy>,
}

#[async_trait]
impl Connection for SpyConnection {
    fn driver_name(&self) -> &str {
        "spy"
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<StatementResult> {
        Ok(StatementResult::default())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        if sql == VALIDATION_QUERY {
            return Ok(QueryResult::from_rows(&["?column?"], vec![vec![Value::Int32(1)]]));
        }
        self.spy.queries.lock().push(RecordedQuery {
            database: self.database.clone(),
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        self.script.reply(sql)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

pub struct SpyDriver {
    dialect: Dialect,
    script: Arc<Script>,
    spy: Arc<Spy>,
    bad_password: Option<String>,
}

impl SpyDriver {
    pub fn new(dialect: Dialect, script: Script) -> Self {
        Self {
            dialect,
            script: Arc::new(script),
            spy: Arc::new(Spy::default()),
            bad_password: None,
        }
    }

    pub fn rejecting(mut self, password: &str) -> Self {
        self.bad_password = Some(password.to_string());
        self
    }

    pub fn spy(&self) -> Arc<Spy> {
        Arc::clone(&self.spy)
    }
}

#[async_trait]
impl DatabaseDriver for SpyDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn name(&self) -> &'static str {
        "spy"
    }

    fn build_url(&self, profile: &ConnectionProfile, database: &str) -> String {
        format!("spy://{}/{}", profile.host, database)
    }

    fn placeholder(&self, index: usize) -> String {
        match self.dialect {
            Dialect::Postgres => format!("${}", index),
            Dialect::SqlServer => format!("@P{}", index),
            Dialect::Oracle => format!(":{}", index),
            Dialect::MySql => "?".to_string(),
        }
    }

    async fn connect(
        &self,
        profile: &ConnectionProfile,
        database: &str,
    ) -> Result<Arc<dyn Connection>> {
        if self.bad_password.is_some() && profile.password == self.bad_password {
            return Err(NebulaError::Connection(format!(
                "password authentication failed for user \"{}\"",
                profile.username.as_deref().unwrap_or_default()
            )));
        }
        self.spy.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(SpyConnection {
            database: database.to_string(),
            script: Arc::clone(&self.script),
            spy: Arc::clone(&self.spy),
        }))
    }
}

pub fn profile(id: &str, dialect: Dialect) -> ConnectionProfile {
    ConnectionProfile::new(id, dialect)
        .with_host("db.test", 0)
        .with_database("sales")
        .with_credentials("app", "secret")
}

/// A service over built-in templates, one profile and the given driver
pub fn service(profile: ConnectionProfile, driver: SpyDriver) -> (TreeService, Arc<Spy>) {
    let spy = driver.spy();
    let mut drivers = DriverRegistry::new();
    drivers.register(Arc::new(driver));
    let profiles = Arc::new(InMemoryProfileStore::from_profiles(vec![profile]));
    let templates = TemplateRegistry::builtin().expect("built-in templates are valid");
    (TreeService::from_parts(profiles, drivers, templates), spy)
}
