//! Oracle connection implementation

use async_trait::async_trait;
use nebula_core::{
    ColumnMeta, Connection, NebulaError, QueryResult, Result, Row, StatementResult, Value,
};
use oracle::sql_type::{OracleType, ToSql};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

type Shared = Arc<Mutex<Option<oracle::Connection>>>;

/// Oracle connection wrapper.
///
/// The inner handle is shared with blocking tasks; `None` once closed.
pub struct OracleConnection {
    inner: Shared,
    closed: Arc<AtomicBool>,
}

impl OracleConnection {
    /// Connect using an EZConnect string (`//host:port/service`)
    pub async fn connect(
        connect_string: &str,
        user: &str,
        password: &str,
        connect_timeout: Duration,
    ) -> Result<Self> {
        tracing::info!(connect_string = %connect_string, "connecting to Oracle database");

        let (connect_string, user, password) =
            (connect_string.to_string(), user.to_string(), password.to_string());
        let task = tokio::task::spawn_blocking(move || {
            oracle::Connection::connect(&user, &password, &connect_string)
        });

        let conn = tokio::time::timeout(connect_timeout, task)
            .await
            .map_err(|_| {
                NebulaError::Timeout(format!(
                    "Oracle connect did not finish within {}ms",
                    connect_timeout.as_millis()
                ))
            })?
            .map_err(|e| NebulaError::Connection(format!("Oracle connect task failed: {}", e)))?
            .map_err(|e| NebulaError::Connection(format!("Failed to connect to Oracle: {}", e)))?;

        tracing::debug!("Oracle connection established");
        Ok(Self {
            inner: Arc::new(Mutex::new(Some(conn))),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run `f` against the live handle on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&oracle::Connection) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let guard = inner.lock();
            let conn = guard
                .as_ref()
                .ok_or_else(|| NebulaError::Connection("Oracle connection is closed".into()))?;
            f(conn)
        })
        .await
        .map_err(|e| NebulaError::Driver(format!("Oracle task failed: {}", e)))?
    }
}

/// Owned bind values; converted to trait objects on the blocking thread
fn to_oracle_params(params: &[Value]) -> Vec<Box<dyn ToSql + Send>> {
    params
        .iter()
        .map(|value| -> Box<dyn ToSql + Send> {
            match value {
                Value::Null => Box::new(None::<String>),
                Value::Bool(v) => Box::new(*v as i64),
                Value::Int16(v) => Box::new(*v as i64),
                Value::Int32(v) => Box::new(*v as i64),
                Value::Int64(v) => Box::new(*v),
                Value::Float32(v) => Box::new(*v as f64),
                Value::Float64(v) => Box::new(*v),
                Value::Bytes(v) => Box::new(v.clone()),
                Value::Decimal(s) | Value::String(s) => Box::new(s.clone()),
                other => Box::new(other.to_string()),
            }
        })
        .collect()
}

fn oracle_to_value(row: &oracle::Row, idx: usize, oracle_type: &OracleType) -> Value {
    let as_string = || {
        row.get::<usize, Option<String>>(idx)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null)
    };

    match oracle_type {
        OracleType::Number(_, 0) | OracleType::Int64 => match row.get::<usize, Option<i64>>(idx) {
            Ok(v) => v.into(),
            Err(_) => as_string(),
        },
        OracleType::Number(..)
        | OracleType::Float(_)
        | OracleType::BinaryFloat
        | OracleType::BinaryDouble => match row.get::<usize, Option<f64>>(idx) {
            Ok(v) => v.into(),
            Err(_) => as_string(),
        },
        OracleType::Raw(_) | OracleType::BLOB => row
            .get::<usize, Option<Vec<u8>>>(idx)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),
        _ => as_string(),
    }
}

#[async_trait]
impl Connection for OracleConnection {
    fn driver_name(&self) -> &str {
        "oracle"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let sql = sql.to_string();
        let params = to_oracle_params(params);

        let affected_rows = self
            .with_conn(move |conn| {
                let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref() as &dyn ToSql).collect();
                let stmt = conn
                    .execute(&sql, &refs)
                    .map_err(|e| NebulaError::Query(format!("Failed to execute statement: {}", e)))?;
                stmt.row_count()
                    .map_err(|e| NebulaError::Driver(e.to_string()))
            })
            .await?;

        tracing::debug!(affected_rows, "statement executed");
        Ok(StatementResult { affected_rows })
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start_time = std::time::Instant::now();
        let sql = sql.to_string();
        let params = to_oracle_params(params);

        let (columns, rows) = self
            .with_conn(move |conn| {
                let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref() as &dyn ToSql).collect();
                let result_set = conn
                    .query(&sql, &refs)
                    .map_err(|e| NebulaError::Query(format!("Failed to execute query: {}", e)))?;

                let infos: Vec<(String, OracleType)> = result_set
                    .column_info()
                    .iter()
                    .map(|info| (info.name().to_string(), info.oracle_type().clone()))
                    .collect();
                let columns: Vec<ColumnMeta> = infos
                    .iter()
                    .enumerate()
                    .map(|(idx, (name, ty))| ColumnMeta::new(name.clone(), ty.to_string(), idx))
                    .collect();
                let column_names: Vec<String> = infos.iter().map(|(name, _)| name.clone()).collect();

                let mut rows = Vec::new();
                for row in result_set {
                    let row = row.map_err(|e| NebulaError::Query(e.to_string()))?;
                    let values = infos
                        .iter()
                        .enumerate()
                        .map(|(idx, (_, ty))| oracle_to_value(&row, idx, ty))
                        .collect();
                    rows.push(Row::new(column_names.clone(), values));
                }
                Ok((columns, rows))
            })
            .await?;

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(row_count = rows.len(), execution_time_ms, "query executed successfully");

        Ok(QueryResult {
            id: uuid::Uuid::new_v4(),
            columns,
            rows,
            affected_rows: 0,
            execution_time_ms,
        })
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.lock().take().map(|conn| conn.close()))
            .await
            .map_err(|e| NebulaError::Driver(format!("Oracle task failed: {}", e)))?
            .transpose()
            .map_err(|e| NebulaError::Connection(format!("Failed to close Oracle connection: {}", e)))?;
        tracing::debug!("Oracle connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
