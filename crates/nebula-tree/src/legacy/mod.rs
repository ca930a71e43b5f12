//! Fixed per-dialect introspection for the classic hierarchy
//!
//! database → schema → table → column, plus constraints, indexes, views,
//! materialized views, sequences, functions, procedures and three role
//! categories. Each dialect supplies one query per node type; listing,
//! binding and id construction are shared.
//!
//! Every returned row carries a synthetic `id` of the form
//! `{connectionId}::{tag}/{segment}/.../{object}` and a display `name`.

mod mssql;
mod mysql;
mod oracle;
mod postgres;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use indexmap::IndexMap;
use nebula_connection::PooledExecutor;
use nebula_core::{Dialect, NebulaError, Result, Row, Value};
use serde_json::{Map, Value as Json};

use crate::resolver::{bind_params, interpolate};

pub use mssql::SqlServerMetadata;
pub use mysql::MySqlMetadata;
pub use oracle::OracleMetadata;
pub use postgres::PostgresMetadata;

/// Path segment names, bound as `:database`, `:schema`, `:table`
const SEGMENT_PARAMS: [&str; 3] = ["database", "schema", "table"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyNodeType {
    Database,
    Schema,
    Table,
    Column,
    Constraint,
    Index,
    View,
    MaterializedView,
    Sequence,
    Function,
    Procedure,
    LoginRole,
    GroupRole,
    SystemRole,
}

impl LegacyNodeType {
    pub const ALL: [LegacyNodeType; 14] = [
        LegacyNodeType::Database,
        LegacyNodeType::Schema,
        LegacyNodeType::Table,
        LegacyNodeType::Column,
        LegacyNodeType::Constraint,
        LegacyNodeType::Index,
        LegacyNodeType::View,
        LegacyNodeType::MaterializedView,
        LegacyNodeType::Sequence,
        LegacyNodeType::Function,
        LegacyNodeType::Procedure,
        LegacyNodeType::LoginRole,
        LegacyNodeType::GroupRole,
        LegacyNodeType::SystemRole,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyNodeType::Database => "database",
            LegacyNodeType::Schema => "schema",
            LegacyNodeType::Table => "table",
            LegacyNodeType::Column => "column",
            LegacyNodeType::Constraint => "constraint",
            LegacyNodeType::Index => "index",
            LegacyNodeType::View => "view",
            LegacyNodeType::MaterializedView => "materialized_view",
            LegacyNodeType::Sequence => "sequence",
            LegacyNodeType::Function => "function",
            LegacyNodeType::Procedure => "procedure",
            LegacyNodeType::LoginRole => "login_role",
            LegacyNodeType::GroupRole => "group_role",
            LegacyNodeType::SystemRole => "system_role",
        }
    }

    /// Type tag used in synthetic ids
    pub fn id_tag(&self) -> &'static str {
        match self {
            LegacyNodeType::MaterializedView => "matview",
            LegacyNodeType::LoginRole => "role/login",
            LegacyNodeType::GroupRole => "role/group",
            LegacyNodeType::SystemRole => "role/system",
            other => other.as_str(),
        }
    }

    /// Path segments (database, schema, table) needed to list this type
    pub fn required_segments(&self) -> usize {
        match self {
            LegacyNodeType::Database
            | LegacyNodeType::LoginRole
            | LegacyNodeType::GroupRole
            | LegacyNodeType::SystemRole => 0,
            LegacyNodeType::Schema => 1,
            LegacyNodeType::Table
            | LegacyNodeType::View
            | LegacyNodeType::MaterializedView
            | LegacyNodeType::Sequence
            | LegacyNodeType::Function
            | LegacyNodeType::Procedure => 2,
            LegacyNodeType::Column | LegacyNodeType::Constraint | LegacyNodeType::Index => 3,
        }
    }

    /// Containers get a trailing `/` on their id
    fn is_container(&self) -> bool {
        matches!(
            self,
            LegacyNodeType::Database
                | LegacyNodeType::Schema
                | LegacyNodeType::Table
                | LegacyNodeType::View
                | LegacyNodeType::MaterializedView
                | LegacyNodeType::Sequence
        )
    }
}

impl fmt::Display for LegacyNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LegacyNodeType {
    type Err = NebulaError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        if normalized == "matview" {
            return Ok(LegacyNodeType::MaterializedView);
        }
        LegacyNodeType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| NebulaError::Configuration(format!("Unknown node type: {}", s)))
    }
}

/// One introspection statement and how to decorate its rows
#[derive(Debug, Clone, Copy)]
pub struct LegacyQuery {
    pub sql: &'static str,
    /// Display template over the row's columns
    pub label: &'static str,
    /// Identifier appended to the id path
    pub object: &'static str,
}

impl LegacyQuery {
    pub const fn new(sql: &'static str) -> Self {
        Self {
            sql,
            label: "{name}",
            object: "{name}",
        }
    }

    pub const fn labeled(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub const fn object(mut self, object: &'static str) -> Self {
        self.object = object;
        self
    }
}

/// A listed object with its synthetic id
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyRow {
    pub id: String,
    /// Display text
    pub name: String,
    /// Raw identifier, the last segment of `id`
    pub object: String,
    pub columns: IndexMap<String, Value>,
}

impl LegacyRow {
    fn from_row(
        connection_id: &str,
        node_type: LegacyNodeType,
        path: &[String],
        query: &LegacyQuery,
        row: &Row,
    ) -> Self {
        let columns: IndexMap<String, Value> = row
            .iter()
            .map(|(column, value)| (column.to_string(), value.clone()))
            .collect();
        let lookup = |token: &str| {
            columns.get(token).map(|value| match value {
                Value::Null => String::new(),
                other => other.to_string(),
            })
        };

        let object = interpolate(query.object, lookup);
        let name = interpolate(query.label, lookup);

        let mut id = format!("{}::{}/", connection_id, node_type.id_tag());
        for segment in path {
            id.push_str(segment);
            id.push('/');
        }
        id.push_str(&object);
        if node_type.is_container() {
            id.push('/');
        }

        Self {
            id,
            name,
            object,
            columns,
        }
    }

    /// Columns plus `id`, display `name` and raw `object`, the way node
    /// templates see a legacy row
    pub fn into_columns(self) -> IndexMap<String, Value> {
        let mut columns = self.columns;
        columns.insert("id".to_string(), Value::String(self.id));
        columns.insert("name".to_string(), Value::String(self.name));
        columns.insert("object".to_string(), Value::String(self.object));
        columns
    }

    pub fn to_json(&self) -> Json {
        let mut map: Map<String, Json> = self
            .columns
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        map.insert("id".to_string(), Json::String(self.id.clone()));
        map.insert("name".to_string(), Json::String(self.name.clone()));
        Json::Object(map)
    }
}

/// Per-dialect source of introspection queries
#[async_trait]
pub trait LegacyMetadataProvider: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// The statement listing `node_type`, or `None` when the dialect has no
    /// such object
    fn query(&self, node_type: LegacyNodeType) -> Option<LegacyQuery>;

    /// List the children of type `node_type` below `segments`
    /// (`[database, schema, table]`, as deep as the type needs).
    ///
    /// Too few segments yields an empty list rather than an error.
    async fn list_children(
        &self,
        connection_id: &str,
        exec: &PooledExecutor,
        node_type: LegacyNodeType,
        segments: &[String],
    ) -> Result<Vec<LegacyRow>> {
        let depth = node_type.required_segments();
        if segments.len() < depth {
            return Ok(Vec::new());
        }
        let Some(query) = self.query(node_type) else {
            return Ok(Vec::new());
        };

        let path = &segments[..depth];
        let bound = bind_params(
            query.sql,
            &SEGMENT_PARAMS,
            |name| segment_value(path, name),
            |index| exec.placeholder(index),
        );
        tracing::debug!(
            dialect = %self.dialect(),
            node_type = %node_type,
            sql = %bound.sql,
            "running legacy introspection query"
        );

        let result = exec.query_rows(&bound.sql, &bound.values).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| LegacyRow::from_row(connection_id, node_type, path, &query, row))
            .collect())
    }
}

fn segment_value(path: &[String], name: &str) -> Value {
    SEGMENT_PARAMS
        .iter()
        .position(|param| *param == name)
        .and_then(|index| path.get(index))
        .map(|segment| Value::String(segment.clone()))
        .unwrap_or(Value::Null)
}

static POSTGRES: PostgresMetadata = PostgresMetadata;
static MYSQL: MySqlMetadata = MySqlMetadata;
static SQL_SERVER: SqlServerMetadata = SqlServerMetadata;
static ORACLE: OracleMetadata = OracleMetadata;

/// Legacy provider for a dialect
pub fn provider_for(dialect: Dialect) -> &'static dyn LegacyMetadataProvider {
    match dialect {
        Dialect::Postgres => &POSTGRES,
        Dialect::MySql => &MYSQL,
        Dialect::SqlServer => &SQL_SERVER,
        Dialect::Oracle => &ORACLE,
    }
}
