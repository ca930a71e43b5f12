//! Supported SQL dialects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::NebulaError;

/// A relational database product / wire protocol.
///
/// The set is closed: every provider, template and legacy query set is keyed
/// by one of these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Dialect {
    Postgres,
    MySql,
    SqlServer,
    Oracle,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::SqlServer,
        Dialect::Oracle,
    ];

    /// Canonical upper-case name, as stored in profiles and template `db_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "POSTGRESQL",
            Dialect::MySql => "MYSQL",
            Dialect::SqlServer => "SQLSERVER",
            Dialect::Oracle => "ORACLE",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "PostgreSQL",
            Dialect::MySql => "MySQL",
            Dialect::SqlServer => "SQL Server",
            Dialect::Oracle => "Oracle",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Dialect::Postgres => 5432,
            Dialect::MySql => 3306,
            Dialect::SqlServer => 1433,
            Dialect::Oracle => 1521,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = NebulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlserver" | "mssql" | "sql_server" => Ok(Dialect::SqlServer),
            "oracle" => Ok(Dialect::Oracle),
            other => Err(NebulaError::UnsupportedDialect(other.to_uppercase())),
        }
    }
}

impl TryFrom<String> for Dialect {
    type Error = NebulaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dialect> for String {
    fn from(value: Dialect) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_parsing_is_case_insensitive() {
        assert_eq!("POSTGRESQL".parse::<Dialect>().ok(), Some(Dialect::Postgres));
        assert_eq!("mssql".parse::<Dialect>().ok(), Some(Dialect::SqlServer));
        assert_eq!("MariaDB".parse::<Dialect>().ok(), Some(Dialect::MySql));

        let err = "db2".parse::<Dialect>().unwrap_err();
        assert!(matches!(err, NebulaError::UnsupportedDialect(name) if name == "DB2"));
    }

    #[test]
    fn test_dialect_serde_uses_canonical_name() {
        let json = serde_json::to_string(&Dialect::Oracle).unwrap();
        assert_eq!(json, "\"ORACLE\"");
        let parsed: Dialect = serde_json::from_str("\"postgres\"").unwrap();
        assert_eq!(parsed, Dialect::Postgres);
    }

    #[test]
    fn test_default_ports() {
        let ports: Vec<u16> = Dialect::ALL.iter().map(Dialect::default_port).collect();
        assert_eq!(ports, vec![5432, 3306, 1433, 1521]);
    }
}
