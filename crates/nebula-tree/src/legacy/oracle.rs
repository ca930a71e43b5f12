//! Oracle data-dictionary queries
//!
//! An Oracle connection sees one database; schemas are users.

use nebula_core::Dialect;

use super::{LegacyMetadataProvider, LegacyNodeType, LegacyQuery};

#[derive(Debug, Default, Clone, Copy)]
pub struct OracleMetadata;

impl LegacyMetadataProvider for OracleMetadata {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn query(&self, node_type: LegacyNodeType) -> Option<LegacyQuery> {
        let query = match node_type {
            LegacyNodeType::Database => LegacyQuery::new(
                "SELECT SYS_CONTEXT('USERENV', 'DB_NAME') AS name FROM DUAL",
            ),
            LegacyNodeType::Schema => LegacyQuery::new(
                "SELECT username AS name
                 FROM all_users
                 WHERE oracle_maintained = 'N'
                 ORDER BY username",
            ),
            LegacyNodeType::Table => LegacyQuery::new(
                "SELECT table_name AS name
                 FROM all_tables
                 WHERE owner = :schema
                 ORDER BY table_name",
            ),
            LegacyNodeType::Column => LegacyQuery::new(
                "SELECT column_name AS name, data_type, nullable AS is_nullable
                 FROM all_tab_columns
                 WHERE owner = :schema AND table_name = :table
                 ORDER BY column_id",
            )
            .labeled("{name} ({data_type})"),
            LegacyNodeType::Constraint => LegacyQuery::new(
                "SELECT constraint_name AS name,
                        DECODE(constraint_type,
                               'P', 'PRIMARY KEY',
                               'U', 'UNIQUE',
                               'R', 'FOREIGN KEY',
                               'C', 'CHECK',
                               constraint_type) AS constraint_type
                 FROM all_constraints
                 WHERE owner = :schema AND table_name = :table
                 ORDER BY constraint_name",
            )
            .labeled("{name} [{constraint_type}]"),
            LegacyNodeType::Index => LegacyQuery::new(
                "SELECT index_name AS name, index_type, uniqueness
                 FROM all_indexes
                 WHERE table_owner = :schema AND table_name = :table
                 ORDER BY index_name",
            ),
            LegacyNodeType::View => LegacyQuery::new(
                "SELECT view_name AS name
                 FROM all_views
                 WHERE owner = :schema
                 ORDER BY view_name",
            ),
            LegacyNodeType::MaterializedView => LegacyQuery::new(
                "SELECT mview_name AS name
                 FROM all_mviews
                 WHERE owner = :schema
                 ORDER BY mview_name",
            ),
            LegacyNodeType::Sequence => LegacyQuery::new(
                "SELECT sequence_name AS name
                 FROM all_sequences
                 WHERE sequence_owner = :schema
                 ORDER BY sequence_name",
            ),
            LegacyNodeType::Function => LegacyQuery::new(
                "SELECT object_name AS name, status
                 FROM all_objects
                 WHERE owner = :schema AND object_type = 'FUNCTION'
                 ORDER BY object_name",
            ),
            LegacyNodeType::Procedure => LegacyQuery::new(
                "SELECT object_name AS name, status
                 FROM all_objects
                 WHERE owner = :schema AND object_type = 'PROCEDURE'
                 ORDER BY object_name",
            ),
            LegacyNodeType::LoginRole => LegacyQuery::new(
                "SELECT username AS name, account_status
                 FROM dba_users
                 WHERE oracle_maintained = 'N'
                 ORDER BY username",
            ),
            LegacyNodeType::GroupRole => LegacyQuery::new(
                "SELECT role AS name
                 FROM dba_roles
                 WHERE oracle_maintained = 'N'
                 ORDER BY role",
            ),
            LegacyNodeType::SystemRole => LegacyQuery::new(
                "SELECT role AS name
                 FROM dba_roles
                 WHERE oracle_maintained = 'Y'
                 ORDER BY role",
            ),
        };
        Some(query)
    }
}
