//! PostgreSQL catalog queries

use nebula_core::Dialect;

use super::{LegacyMetadataProvider, LegacyNodeType, LegacyQuery};

/// Role listing with a category predicate on `pg_roles`
macro_rules! role_query {
    ($filter:literal) => {
        concat!(
            "SELECT
                 r.oid,
                 r.rolname AS name,
                 r.rolcanlogin,
                 r.rolsuper,
                 r.rolinherit,
                 r.rolcreatedb,
                 r.rolcreaterole,
                 r.rolreplication,
                 r.rolbypassrls,
                 CASE
                     WHEN r.rolvaliduntil IS NULL THEN 'infinity'
                     ELSE to_char(r.rolvaliduntil, 'YYYY-MM-DD HH24:MI:SS')
                 END AS valid_until,
                 d.description AS comment
             FROM pg_roles r
             LEFT JOIN pg_shdescription d
               ON d.objoid = r.oid
              AND d.classoid = 'pg_authid'::regclass
             WHERE ",
            $filter,
            "
             ORDER BY r.rolname"
        )
    };
}

const LOGIN_ROLES: &str = role_query!("r.rolcanlogin = true AND r.rolname NOT LIKE 'pg\\_%'");
const GROUP_ROLES: &str = role_query!("r.rolcanlogin = false AND r.rolname NOT LIKE 'pg\\_%'");
const SYSTEM_ROLES: &str = role_query!("r.rolname LIKE 'pg\\_%'");

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresMetadata;

impl LegacyMetadataProvider for PostgresMetadata {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn query(&self, node_type: LegacyNodeType) -> Option<LegacyQuery> {
        let query = match node_type {
            LegacyNodeType::Database => LegacyQuery::new(
                "SELECT datname AS name
                 FROM pg_database
                 WHERE datistemplate = false AND datallowconn = true
                 ORDER BY datname",
            ),
            LegacyNodeType::Schema => LegacyQuery::new(
                "SELECT nspname AS name
                 FROM pg_namespace
                 WHERE nspname NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
                   AND nspname NOT LIKE 'pg_temp_%'
                   AND nspname NOT LIKE 'pg_toast_temp_%'
                 ORDER BY nspname",
            ),
            LegacyNodeType::Table => LegacyQuery::new(
                "SELECT tablename AS name
                 FROM pg_tables
                 WHERE schemaname = :schema AND tablename NOT LIKE 'pg\\_%'
                 ORDER BY tablename",
            ),
            LegacyNodeType::Column => LegacyQuery::new(
                "SELECT column_name AS name, data_type, is_nullable
                 FROM information_schema.columns
                 WHERE table_schema = :schema AND table_name = :table
                 ORDER BY ordinal_position",
            )
            .labeled("{name} ({data_type})"),
            LegacyNodeType::Constraint => LegacyQuery::new(
                "SELECT
                     con.conname AS name,
                     CASE con.contype
                         WHEN 'p' THEN 'PRIMARY KEY'
                         WHEN 'u' THEN 'UNIQUE'
                         WHEN 'f' THEN 'FOREIGN KEY'
                         WHEN 'c' THEN 'CHECK'
                         WHEN 'x' THEN 'EXCLUSION'
                     END AS constraint_type,
                     pg_get_constraintdef(con.oid, true) AS definition
                 FROM pg_constraint con
                 INNER JOIN pg_class rel ON rel.oid = con.conrelid
                 INNER JOIN pg_namespace nsp ON nsp.oid = rel.relnamespace
                 WHERE nsp.nspname = :schema
                   AND rel.relname = :table
                   AND con.contype IN ('p', 'u', 'f', 'c', 'x')
                 ORDER BY con.conname",
            )
            .labeled("{name} [{constraint_type}]"),
            LegacyNodeType::Index => LegacyQuery::new(
                "SELECT indexname AS name, indexdef
                 FROM pg_indexes
                 WHERE schemaname = :schema AND tablename = :table
                 ORDER BY indexname",
            ),
            LegacyNodeType::View => LegacyQuery::new(
                "SELECT viewname AS name
                 FROM pg_views
                 WHERE schemaname = :schema
                 ORDER BY viewname",
            ),
            LegacyNodeType::MaterializedView => LegacyQuery::new(
                "SELECT matviewname AS name
                 FROM pg_matviews
                 WHERE schemaname = :schema
                 ORDER BY matviewname",
            ),
            LegacyNodeType::Sequence => LegacyQuery::new(
                "SELECT sequence_name AS name
                 FROM information_schema.sequences
                 WHERE sequence_schema = :schema
                 ORDER BY sequence_name",
            ),
            LegacyNodeType::Function => LegacyQuery::new(
                "SELECT
                     p.oid,
                     p.proname AS name,
                     pg_get_function_arguments(p.oid) AS args,
                     pg_get_function_result(p.oid) AS result_type
                 FROM pg_proc p
                 JOIN pg_namespace n ON n.oid = p.pronamespace
                 WHERE n.nspname = :schema AND p.prokind = 'f'
                 ORDER BY p.proname, args",
            )
            .labeled("{name}({args}) → {result_type}")
            .object("{name}({args})"),
            LegacyNodeType::Procedure => LegacyQuery::new(
                "SELECT
                     p.oid,
                     p.proname AS name,
                     pg_get_function_arguments(p.oid) AS args
                 FROM pg_proc p
                 JOIN pg_namespace n ON n.oid = p.pronamespace
                 WHERE n.nspname = :schema AND p.prokind = 'p'
                 ORDER BY p.proname, args",
            )
            .labeled("{name}({args})")
            .object("{name}({args})"),
            LegacyNodeType::LoginRole => LegacyQuery::new(LOGIN_ROLES),
            LegacyNodeType::GroupRole => LegacyQuery::new(GROUP_ROLES),
            LegacyNodeType::SystemRole => LegacyQuery::new(SYSTEM_ROLES),
        };
        Some(query)
    }
}
