//! MySQL / MariaDB information_schema queries
//!
//! A MySQL "schema" is the database itself, so the schema level lists just
//! the selected database.

use nebula_core::Dialect;

use super::{LegacyMetadataProvider, LegacyNodeType, LegacyQuery};

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlMetadata;

impl LegacyMetadataProvider for MySqlMetadata {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn query(&self, node_type: LegacyNodeType) -> Option<LegacyQuery> {
        let query = match node_type {
            LegacyNodeType::Database => LegacyQuery::new(
                "SELECT schema_name AS name
                 FROM information_schema.schemata
                 WHERE schema_name NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys')
                 ORDER BY schema_name",
            ),
            LegacyNodeType::Schema => LegacyQuery::new(
                "SELECT schema_name AS name, default_character_set_name AS charset
                 FROM information_schema.schemata
                 WHERE schema_name = :database",
            ),
            LegacyNodeType::Table => LegacyQuery::new(
                "SELECT table_name AS name, engine, table_rows
                 FROM information_schema.tables
                 WHERE table_schema = :schema AND table_type = 'BASE TABLE'
                 ORDER BY table_name",
            ),
            LegacyNodeType::Column => LegacyQuery::new(
                "SELECT column_name AS name, column_type AS data_type, is_nullable
                 FROM information_schema.columns
                 WHERE table_schema = :schema AND table_name = :table
                 ORDER BY ordinal_position",
            )
            .labeled("{name} ({data_type})"),
            LegacyNodeType::Constraint => LegacyQuery::new(
                "SELECT constraint_name AS name, constraint_type
                 FROM information_schema.table_constraints
                 WHERE table_schema = :schema AND table_name = :table
                 ORDER BY constraint_name",
            )
            .labeled("{name} [{constraint_type}]"),
            LegacyNodeType::Index => LegacyQuery::new(
                "SELECT index_name AS name,
                        MIN(non_unique) AS non_unique,
                        GROUP_CONCAT(column_name ORDER BY seq_in_index) AS columns
                 FROM information_schema.statistics
                 WHERE table_schema = :schema AND table_name = :table
                 GROUP BY index_name
                 ORDER BY index_name",
            ),
            LegacyNodeType::View => LegacyQuery::new(
                "SELECT table_name AS name
                 FROM information_schema.views
                 WHERE table_schema = :schema
                 ORDER BY table_name",
            ),
            LegacyNodeType::Function | LegacyNodeType::Procedure => {
                let sql = if node_type == LegacyNodeType::Function {
                    "SELECT routine_name AS name, dtd_identifier AS result_type
                     FROM information_schema.routines
                     WHERE routine_schema = :schema AND routine_type = 'FUNCTION'
                     ORDER BY routine_name"
                } else {
                    "SELECT routine_name AS name
                     FROM information_schema.routines
                     WHERE routine_schema = :schema AND routine_type = 'PROCEDURE'
                     ORDER BY routine_name"
                };
                LegacyQuery::new(sql)
            }
            LegacyNodeType::LoginRole => LegacyQuery::new(
                "SELECT CONCAT(user, '@', host) AS name, user, host
                 FROM mysql.user
                 WHERE account_locked = 'N' AND user NOT LIKE 'mysql.%'
                 ORDER BY user, host",
            ),
            LegacyNodeType::GroupRole => LegacyQuery::new(
                "SELECT CONCAT(user, '@', host) AS name, user, host
                 FROM mysql.user
                 WHERE account_locked = 'Y'
                   AND authentication_string = ''
                   AND user NOT LIKE 'mysql.%'
                 ORDER BY user, host",
            ),
            LegacyNodeType::SystemRole => LegacyQuery::new(
                "SELECT CONCAT(user, '@', host) AS name, user, host
                 FROM mysql.user
                 WHERE user LIKE 'mysql.%'
                 ORDER BY user, host",
            ),
            LegacyNodeType::MaterializedView | LegacyNodeType::Sequence => return None,
        };
        Some(query)
    }
}
