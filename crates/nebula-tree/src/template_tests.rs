use super::*;
use pretty_assertions::assert_eq;

const SAMPLE: &str = r#"
db_type = "POSTGRESQL"

[[root.children]]
resolver = "databases"

[[root.children]]
id = "roles"
label = "Roles"

[[root.children.children]]
id = "login_roles"
resolver = "login_roles"

[[root.children.children]]
id = "group_roles"
resolver = "group_roles"

[resolvers.databases]
sql = "SELECT datname AS name FROM pg_database"

[resolvers.databases.node]
type = "database"
key = "database={name}"

[[resolvers.databases.node.children]]
resolver = "schemas"

[resolvers.schemas]
switch_database = true
sql = "SELECT nspname AS name FROM pg_namespace"

[resolvers.schemas.node]
type = "schema"
key = "database={database}/schema={name}"

[[resolvers.schemas.node.children]]
id = "tables"
type = "table_group"
label = "Tables"
resolver = "tables"

[[resolvers.schemas.node.children]]
id = "empty"

[resolvers.tables]
switch_database = true
params = ["schema"]
sql = "SELECT tablename AS name FROM pg_tables WHERE schemaname = :schema"

[resolvers.tables.node]
type = "table"
icon = "table"
key = "database={database}/schema={schema}/table={name}"

[resolvers.login_roles]
sql = "SELECT rolname AS name FROM pg_roles WHERE rolcanlogin"

[resolvers.login_roles.node]
type = "login_role"
key = "role={name}"

[[resolvers.login_roles.node.children]]
id = "memberships"
label = "Memberships"

[resolvers.group_roles]
sql = "SELECT rolname AS name FROM pg_roles WHERE NOT rolcanlogin"

[resolvers.group_roles.node]
type = "group_role"
key = "role={name}"
"#;

fn sample() -> TreeTemplate {
    TreeTemplate::from_toml(SAMPLE).expect("sample template is valid")
}

fn expect_resolver<'a>(expansion: Expansion<'a>) -> &'a ResolverDef {
    match expansion {
        Expansion::Resolver(resolver) => resolver,
        other => panic!("expected a resolver, got {other:?}"),
    }
}

fn expect_children<'a>(expansion: Expansion<'a>) -> &'a [ChildDef] {
    match expansion {
        Expansion::Children(children) => children,
        other => panic!("expected children, got {other:?}"),
    }
}

#[test]
fn test_decode_groups_and_inline_entries() {
    let template = sample();
    assert_eq!(template.dialect, Dialect::Postgres);
    assert_eq!(template.schema_version, 1);
    assert_eq!(
        template.root[0],
        ChildDef::Inline {
            resolver: "databases".into()
        }
    );

    let ChildDef::Group {
        id,
        node_type,
        label,
        icon,
        resolver,
        children,
        actions,
    } = &template.root[1]
    else {
        panic!("roles should be a group");
    };
    assert_eq!(id, "roles");
    assert_eq!(node_type, "group");
    assert_eq!(label, "Roles");
    assert_eq!(icon, "folder");
    assert_eq!(*resolver, None);
    assert_eq!(children.len(), 2);
    assert_eq!(*actions, None);
}

#[test]
fn test_group_label_defaults_to_id() {
    let template = sample();
    let Some(ChildDef::Group { label, .. }) = template.group("login_roles") else {
        panic!("login_roles group");
    };
    assert_eq!(label, "login_roles");
}

#[test]
fn test_resolver_defaults() {
    let template = sample();
    let databases = template.resolver("databases").expect("databases");
    assert_eq!(databases.kind, ResolverKind::Sql);
    assert!(!databases.switch_database);
    assert_eq!(databases.node.label, "{name}");
    assert_eq!(databases.dimension, "database");

    let tables = template.resolver("tables").expect("tables");
    assert_eq!(tables.params, vec!["schema"]);
    assert_eq!(tables.dimension, "table");
}

#[test]
fn test_explicit_dimension_overrides_key() {
    let source = r#"
db_type = "MYSQL"

[resolvers.users]
sql = "SELECT user AS name FROM mysql.user"
dimension = "user"

[resolvers.users.node]
type = "login_role"
key = "role={name}"
"#;
    let template = TreeTemplate::from_toml(source).expect("valid");
    assert_eq!(template.resolver("users").expect("users").dimension, "user");
}

#[test]
fn test_key_without_dimension_is_rejected() {
    let source = r#"
db_type = "MYSQL"

[resolvers.bad]
sql = "SELECT 1"

[resolvers.bad.node]
type = "thing"
key = "{name}"
"#;
    let err = TreeTemplate::from_toml(source).unwrap_err();
    assert!(matches!(err, NebulaError::Template(_)), "{err}");
}

#[test]
fn test_inline_entry_with_group_fields_is_rejected() {
    let source = r#"
db_type = "MYSQL"

[[root.children]]
resolver = "databases"
label = "Databases"

[resolvers.databases]
sql = "SELECT 1 AS name"

[resolvers.databases.node]
type = "database"
key = "database={name}"
"#;
    let err = TreeTemplate::from_toml(source).unwrap_err();
    assert!(err.to_string().contains("give it an `id`"), "{err}");
}

#[test]
fn test_child_without_id_or_resolver_is_rejected() {
    let source = "db_type = \"MYSQL\"\n[[root.children]]\nlabel = \"Nothing\"\n";
    assert!(TreeTemplate::from_toml(source).is_err());
}

#[test]
fn test_unknown_resolver_reference_is_rejected() {
    let source = r#"
db_type = "POSTGRESQL"

[[root.children]]
id = "tables"
resolver = "tables"
"#;
    let err = TreeTemplate::from_toml(source).unwrap_err();
    assert!(err.to_string().contains("unknown resolver 'tables'"), "{err}");
}

#[test]
fn test_sql_resolver_needs_sql() {
    let source = r#"
db_type = "POSTGRESQL"

[resolvers.databases]
sql = "   "

[resolvers.databases.node]
type = "database"
key = "database={name}"
"#;
    let err = TreeTemplate::from_toml(source).unwrap_err();
    assert!(err.to_string().contains("has no sql"), "{err}");
}

#[test]
fn test_legacy_resolver_needs_node_type() {
    let source = r#"
db_type = "ORACLE"

[resolvers.schemas]
kind = "legacy"

[resolvers.schemas.node]
type = "schema"
key = "schema={object}"
"#;
    let err = TreeTemplate::from_toml(source).unwrap_err();
    assert!(err.to_string().contains("needs a node_type"), "{err}");

    let fixed = source.replace("kind = \"legacy\"", "kind = \"legacy\"\nnode_type = \"schema\"");
    let template = TreeTemplate::from_toml(&fixed).expect("valid");
    assert_eq!(
        template.resolver("schemas").expect("schemas").node_type,
        Some(LegacyNodeType::Schema)
    );
}

#[test]
fn test_unknown_kind_and_version_are_rejected() {
    let kind = r#"
db_type = "POSTGRESQL"

[resolvers.x]
kind = "graphql"
sql = "SELECT 1"

[resolvers.x.node]
type = "x"
key = "x={name}"
"#;
    assert!(TreeTemplate::from_toml(kind).is_err());

    let version = "db_type = \"POSTGRESQL\"\nschema_version = 2\n";
    let err = TreeTemplate::from_toml(version).unwrap_err();
    assert!(err.to_string().contains("schema_version 2"), "{err}");

    let dialect = "db_type = \"DB2\"\n";
    assert!(matches!(
        TreeTemplate::from_toml(dialect).unwrap_err(),
        NebulaError::UnsupportedDialect(_)
    ));
}

#[test]
fn test_plan_root() {
    let template = sample();
    let children = expect_children(template.plan(&Context::new()));
    assert_eq!(children.len(), 2);
}

#[test]
fn test_plan_group_runs_its_resolver() {
    let template = sample();
    let ctx = Context::parse("database=sales/schema=public/group=tables");
    let resolver = expect_resolver(template.plan(&ctx));
    assert_eq!(resolver.name, "tables");
}

#[test]
fn test_plan_static_group_lists_its_children() {
    let template = sample();
    let children = expect_children(template.plan(&Context::parse("group=roles")));
    let ids: Vec<_> = children.iter().filter_map(ChildDef::resolver).collect();
    assert_eq!(ids, vec!["login_roles", "group_roles"]);

    let ctx = Context::parse("database=sales/schema=public/group=empty");
    assert_eq!(template.plan(&ctx), Expansion::Empty);
}

#[test]
fn test_plan_deepest_entity() {
    let template = sample();

    let children = expect_children(template.plan(&Context::parse("database=sales")));
    assert_eq!(
        children,
        &[ChildDef::Inline {
            resolver: "schemas".into()
        }]
    );

    let children = expect_children(template.plan(&Context::parse("database=sales/schema=public")));
    assert_eq!(children.len(), 2);

    // A table row carries the group it was listed under
    let ctx = Context::parse("database=sales/schema=public/group=tables/table=orders");
    assert_eq!(expect_children(template.plan(&ctx)), &[] as &[ChildDef]);
}

#[test]
fn test_plan_prefers_group_resolver_for_shared_dimension() {
    let template = sample();

    let ctx = Context::parse("group=login_roles/role=app");
    let children = expect_children(template.plan(&ctx));
    assert_eq!(children.len(), 1);

    let ctx = Context::parse("group=group_roles/role=readers");
    assert_eq!(expect_children(template.plan(&ctx)), &[] as &[ChildDef]);
}

#[test]
fn test_plan_unknown_group_and_dimension() {
    let template = sample();
    assert_eq!(template.plan(&Context::parse("group=nope")), Expansion::Empty);
    assert_eq!(template.plan(&Context::parse("trigger=audit")), Expansion::Empty);
}

#[test]
fn test_group_lookup_searches_node_children() {
    let template = sample();
    assert!(template.group("tables").is_some());
    assert!(template.group("memberships").is_some());
    assert!(template.group("databases").is_none());
}

#[test]
fn test_camel_case_field_names_are_accepted() {
    let doc = r#"
dbType = "POSTGRESQL"
schemaVersion = 1

[[root.children]]
resolver = "databases"

[resolvers.databases]
sql = "SELECT datname AS name FROM pg_database"

[resolvers.databases.node]
type = "database"
key = "database={name}"

[[resolvers.databases.node.children]]
resolver = "schemas"

[resolvers.schemas]
switchDatabase = true
sql = "SELECT nspname AS name FROM pg_namespace"

[resolvers.schemas.node]
type = "schema"
key = "database={database}/schema={name}"
"#;
    let template = TreeTemplate::from_toml(doc).expect("camelCase template");
    assert_eq!(template.dialect, Dialect::Postgres);
    assert_eq!(template.schema_version, 1);
    assert!(template.resolver("schemas").is_some_and(|r| r.switch_database));
    assert!(!template.resolver("databases").is_some_and(|r| r.switch_database));
}

#[test]
fn test_misspelled_field_is_rejected() {
    let doc = r#"
db_type = "POSTGRESQL"

[resolvers.schemas]
switch_databse = true
sql = "SELECT nspname AS name FROM pg_namespace"

[resolvers.schemas.node]
type = "schema"
key = "schema={name}"
"#;
    let err = TreeTemplate::from_toml(doc).unwrap_err();
    assert!(matches!(err, NebulaError::Template(ref msg) if msg.contains("switch_databse")));

    let child = "db_type = \"POSTGRESQL\"\n[[root.children]]\nid = \"roles\"\nlabl = \"Roles\"\n";
    assert!(matches!(
        TreeTemplate::from_toml(child).unwrap_err(),
        NebulaError::Template(_)
    ));
}

#[test]
fn test_conflicting_group_ids_are_rejected() {
    let doc = r#"
db_type = "POSTGRESQL"

[[root.children]]
id = "columns"
resolver = "table_columns"

[[root.children]]
id = "columns"
resolver = "view_columns"

[resolvers.table_columns]
sql = "SELECT attname AS name FROM pg_attribute"

[resolvers.table_columns.node]
type = "column"
key = "column={name}"

[resolvers.view_columns]
sql = "SELECT column_name AS name FROM information_schema.columns"

[resolvers.view_columns.node]
type = "column"
key = "column={name}"
"#;
    let err = TreeTemplate::from_toml(doc).unwrap_err();
    assert!(matches!(err, NebulaError::Template(ref msg) if msg.contains("'columns'")));

    // The same group repeated verbatim is fine
    let same = doc.replace("resolver = \"view_columns\"", "resolver = \"table_columns\"");
    let template = TreeTemplate::from_toml(&same).expect("identical groups");
    assert_eq!(
        template.group("columns").and_then(ChildDef::resolver),
        Some("table_columns")
    );
}

#[test]
fn test_actions_decode_onto_nodes_and_groups() {
    let doc = r#"
db_type = "POSTGRESQL"

[[root.children]]
id = "tables"
resolver = "tables"

[root.children.actions]
menu = [{ label = "New table", handler = "createNewTable" }]

[resolvers.tables]
sql = "SELECT tablename AS name FROM pg_tables"

[resolvers.tables.node]
type = "table"
key = "table={name}"

[resolvers.tables.node.actions.primary]
handler = "previewTable"

[[resolvers.tables.node.actions.menu]]
type = "separator"

[[resolvers.tables.node.actions.menu]]
label = "Drop"
handler = "deleteTable"
variant = "danger"
"#;
    let template = TreeTemplate::from_toml(doc).expect("template with actions");

    let Some(ChildDef::Group {
        actions: Some(group_actions),
        ..
    }) = template.group("tables")
    else {
        panic!("tables group with actions");
    };
    assert_eq!(group_actions.primary, None);
    assert_eq!(group_actions.menu[0].handler.as_deref(), Some("createNewTable"));

    let node_actions = template
        .resolver("tables")
        .and_then(|r| r.node.actions.as_ref())
        .expect("node actions");
    assert_eq!(
        node_actions.primary.as_ref().and_then(|a| a.handler.as_deref()),
        Some("previewTable")
    );
    assert_eq!(node_actions.menu.len(), 2);
    assert_eq!(node_actions.menu[0].action_type.as_deref(), Some("separator"));
    assert_eq!(node_actions.menu[1].variant.as_deref(), Some("danger"));
}

#[test]
fn test_inline_entry_cannot_carry_actions() {
    let doc = r#"
db_type = "POSTGRESQL"

[[root.children]]
resolver = "databases"

[root.children.actions]
menu = []

[resolvers.databases]
sql = "SELECT datname AS name FROM pg_database"

[resolvers.databases.node]
type = "database"
key = "database={name}"
"#;
    assert!(matches!(
        TreeTemplate::from_toml(doc).unwrap_err(),
        NebulaError::Template(_)
    ));
}
