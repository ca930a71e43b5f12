//! Resolver engine: context + resolver definition → tree nodes

use std::sync::Arc;

use indexmap::IndexMap;
use nebula_connection::{PoolManager, PooledExecutor};
use nebula_core::{ConnectionProfile, NebulaError, Result, Value};

use crate::context::Context;
use crate::legacy;
use crate::node::TreeNode;
use crate::template::{ChildDef, NodeDef, ResolverDef, ResolverKind, TreeTemplate};

/// SQL with named parameters replaced by positional markers
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSql {
    pub sql: String,
    /// One value per marker, in marker order
    pub values: Vec<Value>,
    /// Parameter name behind each marker
    pub order: Vec<String>,
}

/// Replace every `:name` for each declared param with `placeholder(n)`.
///
/// Each occurrence gets its own marker and binding, so a parameter used
/// twice is bound twice. `::` casts, quoted text, `--` and `/* */` comments,
/// and identifiers that merely start with a param name are copied through
/// untouched.
pub fn bind_params<P: AsRef<str>>(
    sql: &str,
    params: &[P],
    value_of: impl Fn(&str) -> Value,
    placeholder: impl Fn(usize) -> String,
) -> BoundSql {
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut order = Vec::new();
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(c);
                for (_, next) in chars.by_ref() {
                    out.push(next);
                    if next == c {
                        break;
                    }
                }
            }
            '-' if chars.peek().is_some_and(|(_, next)| *next == '-') => {
                out.push(c);
                for (_, next) in chars.by_ref() {
                    out.push(next);
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek().is_some_and(|(_, next)| *next == '*') => {
                out.push(c);
                if let Some((_, star)) = chars.next() {
                    out.push(star);
                }
                let mut prev = '\0';
                for (_, next) in chars.by_ref() {
                    out.push(next);
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            ':' if chars.peek().is_some_and(|(_, next)| *next == ':') => {
                chars.next();
                out.push_str("::");
            }
            ':' => {
                let start = i + 1;
                let mut end = start;
                while let Some(&(j, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        end = j + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let name = &sql[start..end];
                if !name.is_empty() && params.iter().any(|p| p.as_ref() == name) {
                    values.push(value_of(name));
                    order.push(name.to_string());
                    out.push_str(&placeholder(values.len()));
                } else {
                    out.push(':');
                    out.push_str(name);
                }
            }
            _ => out.push(c),
        }
    }

    BoundSql {
        sql: out,
        values,
        order,
    }
}

/// Substitute `{token}`s; tokens `lookup` cannot resolve stay verbatim
pub fn interpolate(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let token = &after[..close];
        match lookup(token) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('{');
                out.push_str(token);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

/// Render one result row through a node definition.
///
/// Tokens resolve from non-null row values first, then the context. `meta`
/// is the context plus every row column the context does not already name.
fn map_row(node: &NodeDef, ctx: &Context, row: &IndexMap<String, Value>) -> TreeNode {
    let lookup = |token: &str| {
        row.get(token)
            .filter(|v| !v.is_null())
            .map(Value::to_string)
            .or_else(|| ctx.get(token).map(str::to_string))
    };

    let mut meta = TreeNode::context_meta(ctx);
    for (column, value) in row {
        meta.entry(column.clone()).or_insert_with(|| value.to_json());
    }

    TreeNode {
        key: interpolate(&node.key, lookup),
        node_type: interpolate(&node.node_type, lookup),
        label: interpolate(&node.label, lookup),
        icon: interpolate(&node.icon, lookup),
        has_children: !node.children.is_empty(),
        meta,
        is_virtual: false,
        actions: node.actions.clone(),
    }
}

/// Virtual node for a static group entry
fn group_node(ctx: &Context, child: &ChildDef) -> Option<TreeNode> {
    let ChildDef::Group {
        id,
        node_type,
        label,
        icon,
        resolver,
        children,
        actions,
    } = child
    else {
        return None;
    };

    let key_ctx = ctx.with("group", id.as_str());
    let lookup = |token: &str| key_ctx.get(token).map(str::to_string);
    Some(TreeNode {
        key: key_ctx.build_key(),
        node_type: node_type.clone(),
        label: interpolate(label, lookup),
        icon: icon.clone(),
        has_children: resolver.is_some() || !children.is_empty(),
        meta: TreeNode::context_meta(&key_ctx),
        is_virtual: true,
        actions: actions.clone(),
    })
}

/// `[database, schema, table]`, as deep as the context goes
fn legacy_segments(ctx: &Context, default_database: &str) -> Vec<String> {
    let mut segments = vec![ctx.database().unwrap_or(default_database).to_string()];
    for dimension in ["schema", "table"] {
        match ctx.get(dimension) {
            Some(value) => segments.push(value.to_string()),
            None => break,
        }
    }
    segments
}

/// Runs resolvers against pooled executors
pub struct ResolverEngine {
    pools: Arc<PoolManager>,
}

impl ResolverEngine {
    pub fn new(pools: Arc<PoolManager>) -> Self {
        Self { pools }
    }

    /// Emit a child list: groups become virtual nodes without touching the
    /// database, inline entries splice in their resolver's rows.
    pub async fn expand_children(
        &self,
        profile: &ConnectionProfile,
        template: &TreeTemplate,
        ctx: &Context,
        children: &[ChildDef],
    ) -> Result<Vec<TreeNode>> {
        let mut nodes = Vec::with_capacity(children.len());
        for child in children {
            match child {
                ChildDef::Group { .. } => nodes.extend(group_node(ctx, child)),
                ChildDef::Inline { resolver } => {
                    let def = template.resolver(resolver).ok_or_else(|| {
                        NebulaError::Template(format!("Unknown resolver: {}", resolver))
                    })?;
                    nodes.extend(self.run(profile, ctx, def).await?);
                }
            }
        }
        Ok(nodes)
    }

    /// Run one resolver for `ctx`. Rows keep the order the database
    /// returned them in.
    #[tracing::instrument(
        skip(self, profile, ctx, resolver),
        fields(connection_id = %profile.id, resolver = %resolver.name)
    )]
    pub async fn run(
        &self,
        profile: &ConnectionProfile,
        ctx: &Context,
        resolver: &ResolverDef,
    ) -> Result<Vec<TreeNode>> {
        let database = if resolver.switch_database {
            ctx.database()
        } else {
            None
        };
        let exec = self.pools.acquire(&profile.id, database).await?;

        match resolver.kind {
            ResolverKind::Sql => self.run_sql(&exec, profile, ctx, resolver).await,
            ResolverKind::Legacy => self.run_legacy(&exec, profile, ctx, resolver).await,
        }
    }

    async fn run_sql(
        &self,
        exec: &PooledExecutor,
        profile: &ConnectionProfile,
        ctx: &Context,
        resolver: &ResolverDef,
    ) -> Result<Vec<TreeNode>> {
        let bound = bind_params(
            &resolver.sql,
            &resolver.params,
            |name| ctx.get(name).map(Value::from).unwrap_or(Value::Null),
            |index| exec.placeholder(index),
        );
        tracing::debug!(sql = %bound.sql, params = ?bound.order, database = exec.database(), "running resolver");

        let result = exec
            .query_rows(&bound.sql, &bound.values)
            .await
            .map_err(|e| query_failed(&profile.id, resolver, &bound.sql, e))?;

        Ok(result
            .rows
            .iter()
            .map(|row| {
                let columns: IndexMap<String, Value> = row
                    .iter()
                    .map(|(column, value)| (column.to_string(), value.clone()))
                    .collect();
                map_row(&resolver.node, ctx, &columns)
            })
            .collect())
    }

    async fn run_legacy(
        &self,
        exec: &PooledExecutor,
        profile: &ConnectionProfile,
        ctx: &Context,
        resolver: &ResolverDef,
    ) -> Result<Vec<TreeNode>> {
        let node_type = resolver.node_type.ok_or_else(|| {
            NebulaError::Template(format!("legacy resolver '{}' has no node_type", resolver.name))
        })?;
        let provider = legacy::provider_for(profile.dialect);
        let segments = legacy_segments(ctx, exec.database());

        let rows = provider
            .list_children(&profile.id, exec, node_type, &segments)
            .await
            .map_err(|e| {
                let sql = provider.query(node_type).map(|q| q.sql).unwrap_or_default();
                query_failed(&profile.id, resolver, sql, e)
            })?;

        Ok(rows
            .into_iter()
            .map(|row| map_row(&resolver.node, ctx, &row.into_columns()))
            .collect())
    }
}

fn query_failed(connection_id: &str, resolver: &ResolverDef, sql: &str, err: NebulaError) -> NebulaError {
    tracing::error!(
        connection_id,
        resolver = %resolver.name,
        sql,
        error = %err,
        "resolver query failed"
    );
    NebulaError::QueryExecutionFailed {
        resolver: resolver.name.clone(),
        message: err.detail(),
    }
}
