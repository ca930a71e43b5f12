//! SQL Server catalog-view queries

use nebula_core::Dialect;

use super::{LegacyMetadataProvider, LegacyNodeType, LegacyQuery};

#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServerMetadata;

impl LegacyMetadataProvider for SqlServerMetadata {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn query(&self, node_type: LegacyNodeType) -> Option<LegacyQuery> {
        let query = match node_type {
            LegacyNodeType::Database => LegacyQuery::new(
                "SELECT name
                 FROM sys.databases
                 WHERE state = 0
                 ORDER BY name",
            ),
            LegacyNodeType::Schema => LegacyQuery::new(
                "SELECT s.name
                 FROM sys.schemas s
                 WHERE s.schema_id < 16384
                   AND s.name NOT IN ('sys', 'INFORMATION_SCHEMA', 'guest')
                 ORDER BY s.name",
            ),
            LegacyNodeType::Table => LegacyQuery::new(
                "SELECT t.name
                 FROM sys.tables t
                 JOIN sys.schemas s ON s.schema_id = t.schema_id
                 WHERE s.name = :schema AND t.is_ms_shipped = 0
                 ORDER BY t.name",
            ),
            LegacyNodeType::Column => LegacyQuery::new(
                "SELECT column_name AS name, data_type, is_nullable
                 FROM INFORMATION_SCHEMA.COLUMNS
                 WHERE table_schema = :schema AND table_name = :table
                 ORDER BY ordinal_position",
            )
            .labeled("{name} ({data_type})"),
            LegacyNodeType::Constraint => LegacyQuery::new(
                "SELECT constraint_name AS name, constraint_type
                 FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS
                 WHERE table_schema = :schema AND table_name = :table
                 ORDER BY constraint_name",
            )
            .labeled("{name} [{constraint_type}]"),
            LegacyNodeType::Index => LegacyQuery::new(
                "SELECT i.name, i.type_desc, i.is_unique
                 FROM sys.indexes i
                 JOIN sys.tables t ON t.object_id = i.object_id
                 JOIN sys.schemas s ON s.schema_id = t.schema_id
                 WHERE s.name = :schema AND t.name = :table AND i.name IS NOT NULL
                 ORDER BY i.name",
            ),
            LegacyNodeType::View => LegacyQuery::new(
                "SELECT v.name
                 FROM sys.views v
                 JOIN sys.schemas s ON s.schema_id = v.schema_id
                 WHERE s.name = :schema
                 ORDER BY v.name",
            ),
            // Indexed views are the closest SQL Server has to materialized views
            LegacyNodeType::MaterializedView => LegacyQuery::new(
                "SELECT v.name
                 FROM sys.views v
                 JOIN sys.schemas s ON s.schema_id = v.schema_id
                 JOIN sys.indexes i ON i.object_id = v.object_id AND i.index_id = 1
                 WHERE s.name = :schema
                 ORDER BY v.name",
            ),
            LegacyNodeType::Sequence => LegacyQuery::new(
                "SELECT q.name
                 FROM sys.sequences q
                 JOIN sys.schemas s ON s.schema_id = q.schema_id
                 WHERE s.name = :schema
                 ORDER BY q.name",
            ),
            LegacyNodeType::Function => LegacyQuery::new(
                "SELECT o.name, o.type_desc
                 FROM sys.objects o
                 JOIN sys.schemas s ON s.schema_id = o.schema_id
                 WHERE s.name = :schema AND o.type IN ('FN', 'IF', 'TF')
                 ORDER BY o.name",
            ),
            LegacyNodeType::Procedure => LegacyQuery::new(
                "SELECT p.name
                 FROM sys.procedures p
                 JOIN sys.schemas s ON s.schema_id = p.schema_id
                 WHERE s.name = :schema
                 ORDER BY p.name",
            ),
            LegacyNodeType::LoginRole => LegacyQuery::new(
                "SELECT name, type_desc, is_disabled
                 FROM sys.server_principals
                 WHERE type IN ('S', 'U', 'G') AND name NOT LIKE '##%'
                 ORDER BY name",
            ),
            LegacyNodeType::GroupRole => LegacyQuery::new(
                "SELECT name
                 FROM sys.server_principals
                 WHERE type = 'R' AND is_fixed_role = 0 AND name <> 'public'
                 ORDER BY name",
            ),
            LegacyNodeType::SystemRole => LegacyQuery::new(
                "SELECT name
                 FROM sys.server_principals
                 WHERE type = 'R' AND (is_fixed_role = 1 OR name = 'public')
                 ORDER BY name",
            ),
        };
        Some(query)
    }
}
