//! PostgreSQL connection implementation

use async_trait::async_trait;
use bytes::BytesMut;
use nebula_core::{
    ColumnMeta, Connection, NebulaError, QueryResult, Result, Row, StatementResult, Value,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_postgres::{
    Client, NoTls, Row as PgRow, Statement,
    types::{FromSql, ToSql, Type},
};

use crate::tls::{PostgresSslMode, build_tls_connector};

fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    if let Some(detail) = db_error.detail().filter(|d| !d.trim().is_empty()) {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db_error.hint().filter(|h| !h.trim().is_empty()) {
        message.push_str(&format!(" (hint: {})", hint));
    }
    format!("{} (code: {})", message, db_error.code().code())
}

/// PostgreSQL connection wrapper
pub struct PostgresConnection {
    client: Mutex<Option<Client>>,
    closed: AtomicBool,
}

impl PostgresConnection {
    /// Connect to a PostgreSQL database
    pub async fn connect(
        host: &str,
        port: u16,
        database: &str,
        user: Option<&str>,
        password: Option<&str>,
        ssl_mode: PostgresSslMode,
        ssl_ca_cert: Option<&str>,
    ) -> Result<Self> {
        tracing::info!(
            host = %host,
            port = %port,
            database = %database,
            ssl_mode = ?ssl_mode,
            "connecting to PostgreSQL database"
        );

        let mut config = tokio_postgres::Config::new();
        config.host(host).port(port).application_name("nebula");
        if !database.is_empty() {
            config.dbname(database);
        }
        if let Some(u) = user {
            config.user(u);
        }
        if let Some(p) = password {
            config.password(p);
        }
        config.ssl_mode(ssl_mode.to_tokio_postgres());

        let client = if ssl_mode.uses_tls() {
            let tls = build_tls_connector(ssl_mode, ssl_ca_cert)?;
            let (client, connection) = config.connect(tls).await.map_err(|e| {
                NebulaError::Connection(format!(
                    "Failed to connect to PostgreSQL: {}",
                    format_postgres_error(&e)
                ))
            })?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });
            client
        } else {
            let (client, connection) = config.connect(NoTls).await.map_err(|e| {
                NebulaError::Connection(format!(
                    "Failed to connect to PostgreSQL: {}",
                    format_postgres_error(&e)
                ))
            })?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });
            client
        };

        tracing::debug!(host = %host, database = %database, "PostgreSQL connection established");
        Ok(Self {
            client: Mutex::new(Some(client)),
            closed: AtomicBool::new(false),
        })
    }

    /// Prepare `sql` and coerce `params` to the statement's declared types
    async fn prepare(client: &Client, sql: &str, params: &[Value]) -> Result<(Statement, Vec<PgValue>)> {
        let statement = client.prepare(sql).await.map_err(|e| {
            NebulaError::Query(format!("Failed to prepare statement: {}", format_postgres_error(&e)))
        })?;

        let param_types = statement.params();
        let pg_params = params
            .iter()
            .enumerate()
            .map(|(i, value)| match param_types.get(i) {
                Some(target) => PgValue::from_value_for_type(value, target),
                None => PgValue::from_value(value),
            })
            .collect();
        Ok((statement, pg_params))
    }
}

/// Owned parameter value bound through `ToSql`
#[derive(Debug)]
enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Oid(u32),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
}

impl PgValue {
    /// Convert a `Value` into the variant matching the target parameter type,
    /// so e.g. a context string bound to an `oid` or `int4` slot is sent with
    /// the right binary width.
    fn from_value_for_type(value: &Value, target: &Type) -> Self {
        match value {
            Value::Int16(v) => Self::coerce_int(*v as i64, target),
            Value::Int32(v) => Self::coerce_int(*v as i64, target),
            Value::Int64(v) => Self::coerce_int(*v, target),
            Value::String(s) => Self::coerce_string(s, target),
            other => Self::from_value(other),
        }
    }

    fn coerce_int(value: i64, target: &Type) -> Self {
        match *target {
            Type::INT2 => PgValue::Int16(value as i16),
            Type::INT4 => PgValue::Int32(value as i32),
            Type::OID => PgValue::Oid(value as u32),
            Type::TEXT | Type::VARCHAR | Type::NAME => PgValue::String(value.to_string()),
            _ => PgValue::Int64(value),
        }
    }

    fn coerce_string(value: &str, target: &Type) -> Self {
        let parsed = match *target {
            Type::INT2 => value.parse().ok().map(PgValue::Int16),
            Type::INT4 => value.parse().ok().map(PgValue::Int32),
            Type::INT8 => value.parse().ok().map(PgValue::Int64),
            Type::OID => value.parse().ok().map(PgValue::Oid),
            Type::BOOL => value.parse().ok().map(PgValue::Bool),
            Type::JSON | Type::JSONB => serde_json::from_str(value).ok().map(PgValue::Json),
            _ => None,
        };
        parsed.unwrap_or_else(|| PgValue::String(value.to_string()))
    }

    /// Fallback used when the target type is unknown
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),
            Value::Int16(v) => PgValue::Int16(*v),
            Value::Int32(v) => PgValue::Int32(*v),
            Value::Int64(v) => PgValue::Int64(*v),
            Value::Float32(v) => PgValue::Float32(*v),
            Value::Float64(v) => PgValue::Float64(*v),
            Value::Decimal(v) | Value::String(v) => PgValue::String(v.clone()),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Uuid(v) => PgValue::Uuid(*v),
            Value::Json(v) => PgValue::Json(v.clone()),
            Value::Date(v) => PgValue::Date(*v),
            Value::Time(v) => PgValue::Time(*v),
            Value::DateTime(v) => PgValue::DateTime(*v),
            Value::DateTimeUtc(v) => PgValue::DateTimeUtc(*v),
            Value::Array(_) => PgValue::String(value.to_string()),
        }
    }
}

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgValue::Null => Ok(postgres_types::IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Oid(v) => v.to_sql(ty, out),
            PgValue::Float32(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::String(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Uuid(v) => v.to_sql(ty, out),
            PgValue::Json(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
            PgValue::Time(v) => v.to_sql(ty, out),
            PgValue::DateTime(v) => v.to_sql(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

/// Raw UTF-8 fallback for types without a dedicated mapping (enums, regtype, ...)
struct PgFallbackString(String);

impl<'a> FromSql<'a> for PgFallbackString {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(String::from_utf8(raw.to_vec())?))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| NebulaError::Connection("PostgreSQL connection is closed".into()))?;

        let (statement, pg_params) = Self::prepare(client, sql, params).await?;
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let affected_rows = client.execute(&statement, &param_refs).await.map_err(|e| {
            NebulaError::Query(format!("Failed to execute statement: {}", format_postgres_error(&e)))
        })?;

        tracing::debug!(affected_rows, "statement executed");
        Ok(StatementResult { affected_rows })
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start_time = std::time::Instant::now();
        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| NebulaError::Connection("PostgreSQL connection is closed".into()))?;

        let (statement, pg_params) = Self::prepare(client, sql, params).await?;
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let pg_rows = client.query(&statement, &param_refs).await.map_err(|e| {
            NebulaError::Query(format!("Failed to execute query: {}", format_postgres_error(&e)))
        })?;

        // Column metadata comes from the statement so empty results still carry columns
        let columns: Vec<ColumnMeta> = statement
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| ColumnMeta::new(col.name(), col.type_().name(), idx))
            .collect();
        let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

        let rows = pg_rows
            .iter()
            .map(|pg_row| {
                let values = (0..column_names.len())
                    .map(|idx| postgres_to_value(pg_row, idx))
                    .collect();
                Row::new(column_names.clone(), values)
            })
            .collect::<Vec<_>>();

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
        if !self.closed.swap(true, Ordering::SeqCst) {
            // Dropping the client ends the spawned connection task
            self.client.lock().await.take();
            tracing::debug!("PostgreSQL connection closed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn postgres_to_value(row: &PgRow, idx: usize) -> Value {
    fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Option<T> {
        row.try_get::<_, Option<T>>(idx).ok().flatten()
    }

    match row.columns()[idx].type_().name() {
        "bool" => get::<bool>(row, idx).map(Value::Bool),
        "int2" => get::<i16>(row, idx).map(Value::Int16),
        "int4" => get::<i32>(row, idx).map(Value::Int32),
        "int8" => get::<i64>(row, idx).map(Value::Int64),
        "oid" => get::<u32>(row, idx).map(|v| Value::Int64(v as i64)),
        "float4" => get::<f32>(row, idx).map(Value::Float32),
        "float8" => get::<f64>(row, idx).map(Value::Float64),
        "text" | "varchar" | "char" | "bpchar" | "name" => get::<String>(row, idx).map(Value::String),
        "bytea" => get::<Vec<u8>>(row, idx).map(Value::Bytes),
        "uuid" => get::<uuid::Uuid>(row, idx).map(Value::Uuid),
        "json" | "jsonb" => get::<serde_json::Value>(row, idx).map(Value::Json),
        "date" => get::<chrono::NaiveDate>(row, idx).map(Value::Date),
        "time" => get::<chrono::NaiveTime>(row, idx).map(Value::Time),
        "timestamp" => get::<chrono::NaiveDateTime>(row, idx).map(Value::DateTime),
        "timestamptz" => get::<chrono::DateTime<chrono::Utc>>(row, idx).map(Value::DateTimeUtc),
        "_text" | "_varchar" | "_name" => get::<Vec<String>>(row, idx)
            .map(|arr| Value::Array(arr.into_iter().map(Value::String).collect())),
        _ => get::<PgFallbackString>(row, idx).map(|v| Value::String(v.0)),
    }
    .unwrap_or(Value::Null)
}
