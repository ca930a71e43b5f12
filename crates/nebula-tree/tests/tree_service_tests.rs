//! Integration tests for TreeService over built-in templates

mod common;

use std::sync::Arc;

use nebula_core::{Dialect, NebulaError, Value};
use nebula_tree::{CONNECTED_MESSAGE, Context, TreeNode};
use pretty_assertions::assert_eq;

use common::{Script, SpyDriver, profile, service};

fn keys(nodes: &[TreeNode]) -> Vec<&str> {
    nodes.iter().map(|n| n.key.as_str()).collect()
}

fn postgres_script() -> Script {
    Script::new()
        .rows(
            "FROM pg_database",
            &["name", "encoding"],
            vec![vec![Value::from("sales"), Value::from("UTF8")]],
        )
        .names("FROM pg_namespace", &["public", "reporting"])
        .names("FROM pg_class c", &["orders"])
        .rows(
            "FROM information_schema.columns",
            &["name", "data_type", "is_nullable", "column_default"],
            vec![vec![
                Value::from("id"),
                Value::from("integer"),
                Value::from("NO"),
                Value::Null,
            ]],
        )
}

// ============ PostgreSQL template ============

#[tokio::test]
async fn root_lists_databases_and_role_group() {
    let (service, spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, postgres_script()),
    );

    let nodes = service.list_children("c1", "").await.expect("list root");

    assert_eq!(keys(&nodes), vec!["database=sales", "group=roles"]);
    let database = &nodes[0];
    assert_eq!(database.node_type, "database");
    assert_eq!(database.label, "sales");
    assert!(database.has_children);
    assert!(!database.is_virtual);
    assert_eq!(database.meta["encoding"], "UTF8");

    let roles = &nodes[1];
    assert_eq!(roles.node_type, "role_group");
    assert!(roles.is_virtual);

    let queries = spy.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].database, "sales");
}

#[tokio::test]
async fn database_expands_into_schemas() {
    let (service, spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, postgres_script()),
    );

    let nodes = service
        .list_children("c1", "database=sales")
        .await
        .expect("list schemas");

    assert_eq!(
        keys(&nodes),
        vec!["database=sales/schema=public", "database=sales/schema=reporting"]
    );
    assert!(nodes.iter().all(|n| n.node_type == "schema" && n.has_children));
    assert_eq!(nodes[0].meta["database"], "sales");

    let queries = spy.queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].sql.contains("NOT IN ('pg_catalog', 'information_schema', 'pg_toast')"));
    assert!(queries[0].params.is_empty());
}

#[tokio::test]
async fn keys_round_trip_through_expansion() {
    let (service, _spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, postgres_script()),
    );

    let databases = service.list_children("c1", "").await.expect("root");
    let schemas = service
        .list_children("c1", &databases[0].key)
        .await
        .expect("schemas");
    let direct = service
        .expand("c1", &Context::parse(&databases[0].key), "schemas")
        .await
        .expect("expand");

    assert_eq!(schemas, direct);
    for node in &schemas {
        assert_eq!(Context::parse(&node.key).build_key(), node.key);
    }
}

#[tokio::test]
async fn schema_groups_are_virtual_and_issue_no_query() {
    let (service, spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, postgres_script()),
    );

    let groups = service
        .list_children("c1", "database=sales/schema=public")
        .await
        .expect("schema groups");

    assert_eq!(
        keys(&groups),
        vec![
            "database=sales/schema=public/group=tables",
            "database=sales/schema=public/group=views",
            "database=sales/schema=public/group=materialized_views",
            "database=sales/schema=public/group=functions",
            "database=sales/schema=public/group=sequences",
        ]
    );
    assert!(groups.iter().all(|g| g.is_virtual && g.has_children));

    let roles = service.list_children("c1", "group=roles").await.expect("roles");
    assert_eq!(
        keys(&roles),
        vec!["group=login_roles", "group=group_roles", "group=system_roles"]
    );

    assert_eq!(spy.query_count(), 0);
    assert_eq!(spy.connects(), 0);
    assert_eq!(service.pools().cached_pool_count(), 0);
}

#[tokio::test]
async fn group_runs_resolver_with_bound_params() {
    let (service, spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, postgres_script()),
    );

    let tables = service
        .list_children("c1", "database=analytics/schema=public/group=tables")
        .await
        .expect("tables");

    assert_eq!(keys(&tables), vec!["database=analytics/schema=public/table=orders"]);
    assert_eq!(tables[0].meta["group"], "tables");

    let queries = spy.queries();
    assert_eq!(queries[0].database, "analytics");
    assert!(queries[0].sql.contains("n.nspname = $1"));
    assert!(queries[0].sql.contains("c.reltuples::bigint"));
    assert_eq!(queries[0].params, vec![Value::from("public")]);
}

#[tokio::test]
async fn table_groups_lead_to_columns() {
    let (service, spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, postgres_script()),
    );

    let groups = service
        .list_children("c1", "database=sales/schema=public/table=orders")
        .await
        .expect("table groups");
    assert_eq!(
        groups[0].key,
        "database=sales/schema=public/group=columns/table=orders"
    );

    let columns = service
        .list_children("c1", &groups[0].key)
        .await
        .expect("columns");
    assert_eq!(
        keys(&columns),
        vec!["database=sales/schema=public/table=orders/column=id"]
    );
    assert_eq!(columns[0].label, "id (integer)");
    assert!(!columns[0].has_children);
    assert_eq!(columns[0].meta["column_default"], serde_json::Value::Null);

    let queries = spy.queries();
    assert_eq!(
        queries[0].params,
        vec![Value::from("public"), Value::from("orders")]
    );
}

#[tokio::test]
async fn unknown_dimension_lists_nothing() {
    let (service, spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, postgres_script()),
    );

    let nodes = service
        .list_children("c1", "database=sales/trigger=audit")
        .await
        .expect("list");
    // `database` is still the deepest known dimension
    assert_eq!(nodes.len(), 2);

    let nodes = service.list_children("c1", "trigger=audit").await.expect("list");
    assert!(nodes.is_empty());
    assert_eq!(spy.query_count(), 1);
}

// ============ errors ============

#[tokio::test]
async fn query_failure_becomes_error_node() {
    let script = Script::new().fail("FROM pg_namespace", "permission denied for database sales");
    let (service, _spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, script),
    );

    let nodes = service
        .list_children("c1", "database=sales")
        .await
        .expect("listing recovers");

    assert_eq!(nodes, vec![TreeNode::error("permission denied for database sales")]);
    assert_eq!(nodes[0].key, "error");
    assert_eq!(nodes[0].icon, "error");
}

#[tokio::test]
async fn expand_propagates_query_failure() {
    let script = Script::new().fail("FROM pg_namespace", "permission denied for database sales");
    let (service, _spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, script),
    );

    let err = service
        .expand("c1", &Context::parse("database=sales"), "schemas")
        .await
        .unwrap_err();

    match err {
        NebulaError::QueryExecutionFailed { resolver, message } => {
            assert_eq!(resolver, "schemas");
            assert_eq!(message, "permission denied for database sales");
        }
        other => panic!("expected QueryExecutionFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn pool_failure_becomes_error_node() {
    let mut bad = profile("c1", Dialect::Postgres);
    bad.password = Some("wrong".into());
    let (service, _spy) = service(
        bad,
        SpyDriver::new(Dialect::Postgres, postgres_script()).rejecting("wrong"),
    );

    let nodes = service.list_children("c1", "").await.expect("listing recovers");
    assert_eq!(nodes.len(), 1);
    assert!(nodes[0].is_error());
    assert!(nodes[0].label.contains("password authentication failed"));
}

#[tokio::test]
async fn unknown_connection_and_resolver_are_errors() {
    let (service, _spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, postgres_script()),
    );

    let err = service.list_children("nope", "").await.unwrap_err();
    assert!(matches!(err, NebulaError::ConnectionNotFound(id) if id == "nope"));

    let err = service
        .expand("c1", &Context::new(), "triggers")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ============ MySQL template ============

#[tokio::test]
async fn mysql_binds_database_and_stays_on_default_pool() {
    let script = Script::new().names("FROM information_schema.tables", &["customers", "orders"]);
    let (service, spy) = service(
        profile("m1", Dialect::MySql),
        SpyDriver::new(Dialect::MySql, script),
    );

    let tables = service
        .list_children("m1", "database=shop/group=tables")
        .await
        .expect("tables");

    assert_eq!(
        keys(&tables),
        vec!["database=shop/table=customers", "database=shop/table=orders"]
    );
    let queries = spy.queries();
    assert_eq!(queries[0].database, "sales");
    assert!(queries[0].sql.contains("table_schema = ?"));
    assert_eq!(queries[0].params, vec![Value::from("shop")]);
}

// ============ legacy ============

#[tokio::test]
async fn sql_server_walks_through_legacy_resolvers() {
    let script = Script::new()
        .names("FROM sys.databases", &["sales"])
        .names("FROM sys.schemas", &["dbo"]);
    let (service, spy) = service(
        profile("ms1", Dialect::SqlServer),
        SpyDriver::new(Dialect::SqlServer, script),
    );

    let root = service.list_children("ms1", "").await.expect("root");
    assert_eq!(keys(&root), vec!["database=sales", "group=roles"]);
    assert_eq!(root[0].meta["id"], "ms1::database/sales/");

    let schemas = service
        .list_children("ms1", "database=sales")
        .await
        .expect("schemas");
    assert_eq!(keys(&schemas), vec!["database=sales/schema=dbo"]);
    assert_eq!(schemas[0].meta["id"], "ms1::schema/sales/dbo/");
    assert_eq!(spy.query_count(), 2);
}

#[tokio::test]
async fn legacy_listing_builds_synthetic_ids() {
    let script = Script::new().names("FROM sys.tables", &["customers", "orders"]);
    let (service, spy) = service(
        profile("ms1", Dialect::SqlServer),
        SpyDriver::new(Dialect::SqlServer, script),
    );

    let rows = service
        .list_legacy_children("ms1", "table", "/sales/dbo/")
        .await
        .expect("tables");

    let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["ms1::table/sales/dbo/customers/", "ms1::table/sales/dbo/orders/"]);
    assert_eq!(rows[0].name, "customers");

    let queries = spy.queries();
    assert_eq!(queries[0].database, "sales");
    assert!(queries[0].sql.contains("s.name = @P1"));
    assert_eq!(queries[0].params, vec![Value::from("dbo")]);
}

#[tokio::test]
async fn legacy_listing_with_short_path_is_empty() {
    let (service, spy) = service(
        profile("ms1", Dialect::SqlServer),
        SpyDriver::new(Dialect::SqlServer, Script::new()),
    );

    let rows = service
        .list_legacy_children("ms1", "column", "sales/dbo")
        .await
        .expect("columns");
    assert!(rows.is_empty());
    assert_eq!(spy.query_count(), 0);

    let err = service
        .list_legacy_children("ms1", "trigger", "sales/dbo")
        .await
        .unwrap_err();
    assert!(err.is_client_error());
}

// ============ connectivity tests ============

#[tokio::test]
async fn test_connection_succeeds_without_caching() {
    let (service, _spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, Script::new()),
    );

    let message = service
        .test_connection(profile("c1", Dialect::Postgres))
        .await
        .expect("connects");
    assert_eq!(message, CONNECTED_MESSAGE);
    assert_eq!(service.pools().cached_pool_count(), 0);
}

#[tokio::test]
async fn bad_credentials_leave_cache_unchanged() {
    let (service, _spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, postgres_script()).rejecting("wrong"),
    );
    service.list_children("c1", "").await.expect("prime cache");
    let before = service.pools().cached_pool_count();
    assert_eq!(before, 1);

    let mut bad = profile("c1", Dialect::Postgres);
    bad.password = Some("wrong".into());
    for _ in 0..2 {
        let err = service.test_connection(bad.clone()).await.unwrap_err();
        match err {
            NebulaError::PoolCreationFailed(message) => {
                assert_eq!(message, "password authentication failed for user \"app\"");
            }
            other => panic!("expected PoolCreationFailed, got {other:?}"),
        }
    }
    assert_eq!(service.pools().cached_pool_count(), before);
}

#[tokio::test]
async fn missing_password_is_taken_from_stored_profile() {
    let mut stored = profile("c1", Dialect::Postgres);
    stored.password = Some("wrong".into());
    let (service, _spy) = service(
        stored,
        SpyDriver::new(Dialect::Postgres, Script::new()).rejecting("wrong"),
    );

    let mut unchanged = profile("c1", Dialect::Postgres);
    unchanged.password = None;
    assert!(service.test_connection(unchanged).await.is_err());

    let mut blank = profile("c1", Dialect::Postgres);
    blank.password = Some(String::new());
    assert_eq!(
        service.test_connection(blank).await.expect("blank password is kept"),
        CONNECTED_MESSAGE
    );
}

// ============ lifecycle ============

#[tokio::test]
async fn profile_change_releases_pools() {
    let (service, _spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, postgres_script()),
    );

    service.list_children("c1", "").await.expect("root");
    service
        .list_children("c1", "database=analytics/schema=public/group=tables")
        .await
        .expect("tables");
    assert_eq!(service.pools().cached_pool_count(), 2);

    assert_eq!(service.on_profile_changed("c1").await, 2);
    assert_eq!(service.pools().cached_pool_count(), 0);
    assert_eq!(service.on_profile_deleted("c1").await, 0);

    service.list_children("c1", "").await.expect("root again");
    assert_eq!(service.pools().cached_pool_count(), 1);
    service.shutdown().await;
    assert_eq!(service.pools().cached_pool_count(), 0);
}

#[tokio::test]
async fn disconnect_closes_pools_and_next_listing_reconnects() {
    let (service, spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, postgres_script()),
    );

    service.list_children("c1", "").await.expect("root");
    let first = service.pools().acquire("c1", None).await.expect("cached");
    assert_eq!(service.pools().cached_pool_count(), 1);

    assert_eq!(service.disconnect("c1").await, 1);
    assert!(first.is_closed());
    assert_eq!(service.pools().cached_pool_count(), 0);
    assert_eq!(service.disconnect("c1").await, 0);

    let nodes = service.list_children("c1", "").await.expect("root again");
    assert!(nodes.iter().all(|n| !n.is_error()));
    assert_eq!(service.pools().cached_pool_count(), 1);
    assert_eq!(spy.connects(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_listings_share_one_pool() {
    let (service, _spy) = service(
        profile("c1", Dialect::Postgres),
        SpyDriver::new(Dialect::Postgres, postgres_script()),
    );
    let service = Arc::new(service);

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.list_children("c1", "database=sales").await })
        })
        .collect();

    for task in tasks {
        let nodes = task.await.expect("join").expect("list");
        assert_eq!(nodes.len(), 2);
    }
    assert_eq!(service.pools().cached_pool_count(), 1);
}
