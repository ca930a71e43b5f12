//! MS SQL Server connection implementation using tiberius

use async_trait::async_trait;
use nebula_core::{
    ColumnMeta, Connection, NebulaError, QueryResult, Result, Row, StatementResult, Value,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, Row as TiberiusRow};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use uuid::Uuid;

/// MS SQL Server connection errors
#[derive(Debug, thiserror::Error)]
pub enum MssqlConnectionError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Connection timed out after {0}ms")]
    Timeout(u128),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Tiberius error: {0}")]
    Tiberius(#[from] tiberius::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MssqlConnectionError> for NebulaError {
    fn from(err: MssqlConnectionError) -> Self {
        match err {
            MssqlConnectionError::ConnectionFailed(_)
            | MssqlConnectionError::AuthenticationFailed(_)
            | MssqlConnectionError::ConnectionClosed
            | MssqlConnectionError::Io(_) => NebulaError::Connection(err.to_string()),
            MssqlConnectionError::Timeout(_) => NebulaError::Timeout(err.to_string()),
            MssqlConnectionError::QueryFailed(_) | MssqlConnectionError::Tiberius(_) => {
                NebulaError::Driver(err.to_string())
            }
        }
    }
}

type TdsClient = Client<Compat<TcpStream>>;

/// MS SQL Server connection using tiberius
pub struct MssqlConnection {
    client: Mutex<Option<TdsClient>>,
    closed: AtomicBool,
    database: Option<String>,
}

impl MssqlConnection {
    /// Create a new MS SQL Server connection
    ///
    /// # Arguments
    /// * `host` - Server hostname
    /// * `port` - Server port (default 1433)
    /// * `database` - Database name (optional)
    /// * `username` - Username (None for Windows auth)
    /// * `password` - Password
    /// * `trust_cert` - Whether to trust server certificate (for dev/testing)
    /// * `connect_timeout` - Bound on TCP connect plus TDS login
    #[tracing::instrument(skip(password))]
    pub async fn connect(
        host: &str,
        port: u16,
        database: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
        trust_cert: bool,
        connect_timeout: Duration,
    ) -> std::result::Result<Self, MssqlConnectionError> {
        tracing::debug!("connecting to MS SQL Server at {}:{}", host, port);

        let mut config = Config::new();
        config.host(host);
        config.port(port);
        config.application_name("nebula");

        if let Some(db) = database.filter(|db| !db.is_empty()) {
            config.database(db);
        }
        if trust_cert {
            config.trust_cert();
        }
        config.encryption(EncryptionLevel::Required);

        match username {
            Some(user) => {
                config.authentication(AuthMethod::sql_server(user, password.unwrap_or("")));
            }
            None => {
                return Err(MssqlConnectionError::AuthenticationFailed(
                    "SQL Server authentication requires a username".to_string(),
                ));
            }
        }

        let client = tokio::time::timeout(connect_timeout, Self::dial(config))
            .await
            .map_err(|_| MssqlConnectionError::Timeout(connect_timeout.as_millis()))??;

        tracing::debug!("successfully connected to MS SQL Server");

        Ok(Self {
            client: Mutex::new(Some(client)),
            closed: AtomicBool::new(false),
            database: database.map(String::from),
        })
    }

    async fn dial(config: Config) -> std::result::Result<TdsClient, MssqlConnectionError> {
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| MssqlConnectionError::ConnectionFailed(e.to_string()))?;
        tcp.set_nodelay(true)?;

        Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| match e {
                tiberius::error::Error::Server(token) => {
                    MssqlConnectionError::AuthenticationFailed(token.message().to_string())
                }
                other => MssqlConnectionError::ConnectionFailed(other.to_string()),
            })
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }
}

#[async_trait]
impl Connection for MssqlConnection {
    fn driver_name(&self) -> &str {
        "mssql"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let start = std::time::Instant::now();
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(MssqlConnectionError::ConnectionClosed)?;

        let tiberius_params = values_to_tiberius_params(params);
        let param_refs: Vec<&dyn tiberius::ToSql> = tiberius_params
            .iter()
            .map(|p| p as &dyn tiberius::ToSql)
            .collect();

        let exec_result = client.execute(sql, &param_refs[..]).await.map_err(|e| {
            tracing::error!(error = %e, "execute failed");
            MssqlConnectionError::QueryFailed(e.to_string())
        })?;

        let affected_rows = exec_result.rows_affected().iter().sum::<u64>();
        tracing::debug!(
            affected_rows = affected_rows,
            duration_ms = start.elapsed().as_millis() as u64,
            "execute completed"
        );
        Ok(StatementResult { affected_rows })
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start = std::time::Instant::now();
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(MssqlConnectionError::ConnectionClosed)?;

        let tiberius_params = values_to_tiberius_params(params);
        let param_refs: Vec<&dyn tiberius::ToSql> = tiberius_params
            .iter()
            .map(|p| p as &dyn tiberius::ToSql)
            .collect();

        let query_stream = client.query(sql, &param_refs[..]).await.map_err(|e| {
            tracing::error!(error = %e, "query failed");
            MssqlConnectionError::QueryFailed(e.to_string())
        })?;
        let tib_rows = query_stream
            .into_first_result()
            .await
            .map_err(|e| MssqlConnectionError::QueryFailed(e.to_string()))?;

        let columns: Vec<ColumnMeta> = tib_rows
            .first()
            .map(|first_row| {
                first_row
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| {
                        ColumnMeta::new(col.name(), format!("{:?}", col.column_type()), idx)
                    })
                    .collect()
            })
            .unwrap_or_default();
        let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

        let rows: Vec<Row> = tib_rows
            .into_iter()
            .map(|tib_row| Row::new(column_names.clone(), tiberius_row_to_values(tib_row)))
            .collect();

        let execution_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            duration_ms = execution_time_ms,
            "query completed"
        );

        Ok(QueryResult {
            id: Uuid::new_v4(),
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
        if let Some(client) = self.client.lock().await.take() {
            client
                .close()
                .await
                .map_err(|e| NebulaError::Connection(e.to_string()))?;
        }
        tracing::debug!("MS SQL Server connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn tiberius_row_to_values(row: TiberiusRow) -> Vec<Value> {
    row.into_iter().map(column_data_to_value).collect()
}

fn days_since(year: i32, days: i64) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or_default() + chrono::Duration::days(days)
}

/// 100ns increments since midnight
fn time_from_increments(increments: u64) -> chrono::NaiveTime {
    chrono::NaiveTime::from_num_seconds_from_midnight_opt(
        (increments / 10_000_000) as u32,
        ((increments % 10_000_000) * 100) as u32,
    )
    .unwrap_or_default()
}

/// Convert tiberius ColumnData to a nebula Value
pub(crate) fn column_data_to_value(col_data: ColumnData<'static>) -> Value {
    match col_data {
        ColumnData::Bit(v) => v.into(),
        ColumnData::U8(v) => v.map(|v| Value::Int16(v as i16)).into(),
        ColumnData::I16(v) => v.into(),
        ColumnData::I32(v) => v.into(),
        ColumnData::I64(v) => v.into(),
        ColumnData::F32(v) => v.into(),
        ColumnData::F64(v) => v.into(),
        ColumnData::String(v) => v.map(|s| Value::String(s.into_owned())).into(),
        ColumnData::Guid(v) => v.map(Value::Uuid).into(),
        ColumnData::Binary(v) => v.map(|b| Value::Bytes(b.into_owned())).into(),
        ColumnData::Numeric(v) => v.map(|n| Value::Decimal(n.to_string())).into(),
        ColumnData::DateTime(v) => v
            .map(|v| {
                let time = chrono::NaiveTime::from_num_seconds_from_midnight_opt(
                    (v.seconds_fragments() as f64 / 300.0) as u32,
                    0,
                )
                .unwrap_or_default();
                Value::DateTime(days_since(1900, v.days() as i64).and_time(time))
            })
            .into(),
        ColumnData::SmallDateTime(v) => v
            .map(|v| {
                let time = chrono::NaiveTime::from_num_seconds_from_midnight_opt(
                    (v.seconds_fragments() as u32) * 60,
                    0,
                )
                .unwrap_or_default();
                Value::DateTime(days_since(1900, v.days() as i64).and_time(time))
            })
            .into(),
        ColumnData::DateTime2(v) => v
            .map(|v| {
                Value::DateTime(
                    days_since(1, v.date().days() as i64)
                        .and_time(time_from_increments(v.time().increments())),
                )
            })
            .into(),
        ColumnData::DateTimeOffset(v) => v
            .map(|v| {
                let dt2 = v.datetime2();
                let naive = days_since(1, dt2.date().days() as i64)
                    .and_time(time_from_increments(dt2.time().increments()));
                Value::DateTimeUtc(chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc))
            })
            .into(),
        ColumnData::Date(v) => v.map(|d| Value::Date(days_since(1, d.days() as i64))).into(),
        ColumnData::Time(v) => v.map(|t| Value::Time(time_from_increments(t.increments()))).into(),
        ColumnData::Xml(v) => v.map(|x| Value::String(x.into_owned().into_string())).into(),
    }
}

/// Container for tiberius parameter values
#[derive(Debug)]
pub(crate) enum TiberiusParam {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
}

impl tiberius::ToSql for TiberiusParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            TiberiusParam::Null => ColumnData::String(None),
            TiberiusParam::Bool(v) => ColumnData::Bit(Some(*v)),
            TiberiusParam::I16(v) => ColumnData::I16(Some(*v)),
            TiberiusParam::I32(v) => ColumnData::I32(Some(*v)),
            TiberiusParam::I64(v) => ColumnData::I64(Some(*v)),
            TiberiusParam::F32(v) => ColumnData::F32(Some(*v)),
            TiberiusParam::F64(v) => ColumnData::F64(Some(*v)),
            TiberiusParam::String(v) => {
                ColumnData::String(Some(std::borrow::Cow::Borrowed(v.as_str())))
            }
            TiberiusParam::Bytes(v) => {
                ColumnData::Binary(Some(std::borrow::Cow::Borrowed(v.as_slice())))
            }
            TiberiusParam::Uuid(v) => ColumnData::Guid(Some(*v)),
        }
    }
}

/// Convert nebula Values to tiberius parameters
pub(crate) fn values_to_tiberius_params(values: &[Value]) -> Vec<TiberiusParam> {
    values
        .iter()
        .map(|v| match v {
            Value::Null => TiberiusParam::Null,
            Value::Bool(b) => TiberiusParam::Bool(*b),
            Value::Int16(i) => TiberiusParam::I16(*i),
            Value::Int32(i) => TiberiusParam::I32(*i),
            Value::Int64(i) => TiberiusParam::I64(*i),
            Value::Float32(f) => TiberiusParam::F32(*f),
            Value::Float64(f) => TiberiusParam::F64(*f),
            Value::Bytes(b) => TiberiusParam::Bytes(b.clone()),
            Value::Uuid(u) => TiberiusParam::Uuid(*u),
            Value::Decimal(s) | Value::String(s) => TiberiusParam::String(s.clone()),
            Value::Json(j) => TiberiusParam::String(j.to_string()),
            other => TiberiusParam::String(other.to_string()),
        })
        .collect()
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("database", &self.database)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}
