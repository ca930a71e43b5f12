//! Declarative per-dialect tree templates
//!
//! A template is a root child list plus a map of named resolvers. Documents
//! are TOML; they are read into loose `Raw*` shapes first and then decoded
//! explicitly, so every variant decision is made in one place.

use indexmap::IndexMap;
use nebula_core::{Dialect, NebulaError, Result};
use serde::Deserialize;

use crate::context::Context;
use crate::legacy::LegacyNodeType;
use crate::node::NodeActions;

/// Template document versions this build understands
const SCHEMA_VERSION: u32 = 1;

/// An entry in a child list
#[derive(Debug, Clone, PartialEq)]
pub enum ChildDef {
    /// A virtual grouping node, e.g. "Tables" under a schema
    Group {
        id: String,
        node_type: String,
        label: String,
        icon: String,
        resolver: Option<String>,
        children: Vec<ChildDef>,
        actions: Option<NodeActions>,
    },
    /// Rows of a resolver spliced directly into the list
    Inline { resolver: String },
}

impl ChildDef {
    pub fn resolver(&self) -> Option<&str> {
        match self {
            ChildDef::Group { resolver, .. } => resolver.as_deref(),
            ChildDef::Inline { resolver } => Some(resolver),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverKind {
    Sql,
    /// Delegates to the fixed per-dialect introspection queries
    Legacy,
}

/// How each result row becomes a node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDef {
    pub node_type: String,
    pub label: String,
    pub icon: String,
    pub key: String,
    pub children: Vec<ChildDef>,
    pub actions: Option<NodeActions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverDef {
    pub name: String,
    pub kind: ResolverKind,
    pub sql: String,
    /// Run against the context's database instead of the profile default
    pub switch_database: bool,
    /// Context dimensions bound to `:name` markers in `sql`
    pub params: Vec<String>,
    pub node_type: Option<LegacyNodeType>,
    /// The key dimension each produced row adds
    pub dimension: String,
    pub node: NodeDef,
}

/// What a given context expands into
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expansion<'a> {
    /// Emit these children: groups as virtual nodes, inline entries as rows
    Children(&'a [ChildDef]),
    /// Run this resolver
    Resolver(&'a ResolverDef),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeTemplate {
    pub dialect: Dialect,
    pub schema_version: u32,
    pub root: Vec<ChildDef>,
    pub resolvers: IndexMap<String, ResolverDef>,
}

impl TreeTemplate {
    /// Parse and validate a TOML template document
    pub fn from_toml(source: &str) -> Result<Self> {
        let raw: RawTemplate =
            toml::from_str(source).map_err(|e| NebulaError::Template(e.to_string()))?;
        let template = decode_template(raw)?;
        template.validate()?;
        Ok(template)
    }

    pub fn resolver(&self, name: &str) -> Option<&ResolverDef> {
        self.resolvers.get(name)
    }

    /// Find a group by id anywhere in the template. Validation guarantees
    /// every definition of an id is the same group.
    pub fn group(&self, id: &str) -> Option<&ChildDef> {
        fn find<'a>(children: &'a [ChildDef], id: &str) -> Option<&'a ChildDef> {
            children.iter().find_map(|child| match child {
                ChildDef::Group { id: gid, .. } if gid == id => Some(child),
                ChildDef::Group { children, .. } => find(children, id),
                ChildDef::Inline { .. } => None,
            })
        }

        find(&self.root, id).or_else(|| {
            self.resolvers
                .values()
                .find_map(|r| find(&r.node.children, id))
        })
    }

    /// Resolver whose rows carry `dimension`, preferring `preferred` when
    /// several produce the same one
    fn resolver_for_dimension(&self, dimension: &str, preferred: Option<&str>) -> Option<&ResolverDef> {
        preferred
            .and_then(|name| self.resolvers.get(name))
            .filter(|r| r.dimension == dimension)
            .or_else(|| self.resolvers.values().find(|r| r.dimension == dimension))
    }

    /// Decide what the node identified by `ctx` expands into.
    ///
    /// - root: the template's root children
    /// - `group=g` whose rows are not yet selected: group `g`
    /// - otherwise the deepest entity dimension: its resolver's node children
    pub fn plan<'a>(&'a self, ctx: &Context) -> Expansion<'a> {
        if ctx.is_empty() {
            return Expansion::Children(&self.root);
        }

        let group = ctx.group().and_then(|id| self.group(id));
        let group_resolver = group.and_then(ChildDef::resolver);

        if let Some(ChildDef::Group { children, .. }) = group {
            match group_resolver.and_then(|name| self.resolvers.get(name)) {
                Some(resolver) if !ctx.contains(&resolver.dimension) => {
                    return Expansion::Resolver(resolver);
                }
                Some(_) => {}
                None if !children.is_empty() => return Expansion::Children(children),
                None => return Expansion::Empty,
            }
        } else if let Some(id) = ctx.group() {
            tracing::debug!(group = id, "group not defined in template");
        }

        let deepest = ctx
            .iter()
            .filter(|(dim, _)| *dim != "group")
            .filter_map(|(dim, _)| self.resolver_for_dimension(dim, group_resolver))
            .last();

        match deepest {
            Some(resolver) => Expansion::Children(&resolver.node.children),
            None => Expansion::Empty,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(NebulaError::Template(format!(
                "{}: unsupported schema_version {}",
                self.dialect, self.schema_version
            )));
        }

        let mut referenced = Vec::new();
        collect_resolver_refs(&self.root, &mut referenced);
        for resolver in self.resolvers.values() {
            collect_resolver_refs(&resolver.node.children, &mut referenced);
        }
        if let Some(missing) = referenced.iter().find(|name| !self.resolvers.contains_key(**name)) {
            return Err(NebulaError::Template(format!(
                "{}: unknown resolver '{}'",
                self.dialect, missing
            )));
        }

        let mut groups = Vec::new();
        collect_groups(&self.root, &mut groups);
        for resolver in self.resolvers.values() {
            collect_groups(&resolver.node.children, &mut groups);
        }
        for (i, (id, resolver, children)) in groups.iter().enumerate() {
            let conflicting = groups[..i]
                .iter()
                .find(|(other, ..)| other == id)
                .is_some_and(|(_, other_resolver, other_children)| {
                    other_resolver != resolver || other_children != children
                });
            if conflicting {
                return Err(NebulaError::Template(format!(
                    "{}: group '{}' is defined more than once with different contents",
                    self.dialect, id
                )));
            }
        }

        for resolver in self.resolvers.values() {
            match resolver.kind {
                ResolverKind::Sql if resolver.sql.trim().is_empty() => {
                    return Err(NebulaError::Template(format!(
                        "{}: resolver '{}' has no sql",
                        self.dialect, resolver.name
                    )));
                }
                ResolverKind::Legacy if resolver.node_type.is_none() => {
                    return Err(NebulaError::Template(format!(
                        "{}: legacy resolver '{}' needs a node_type",
                        self.dialect, resolver.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn collect_resolver_refs<'a>(children: &'a [ChildDef], out: &mut Vec<&'a str>) {
    for child in children {
        if let Some(name) = child.resolver() {
            out.push(name);
        }
        if let ChildDef::Group { children, .. } = child {
            collect_resolver_refs(children, out);
        }
    }
}

type GroupEntry<'a> = (&'a str, Option<&'a str>, &'a [ChildDef]);

fn collect_groups<'a>(children: &'a [ChildDef], out: &mut Vec<GroupEntry<'a>>) {
    for child in children {
        if let ChildDef::Group {
            id,
            resolver,
            children,
            ..
        } = child
        {
            out.push((id.as_str(), resolver.as_deref(), children.as_slice()));
            collect_groups(children, out);
        }
    }
}

/// Dimension named by the last `dim=` segment of a key template
fn key_dimension(key_template: &str) -> Option<&str> {
    key_template
        .rsplit('/')
        .find_map(|segment| segment.split_once('='))
        .map(|(dim, _)| dim)
        .filter(|dim| !dim.is_empty())
}

// ============ raw document shapes ============
//
// Field names are snake_case, with camelCase aliases (`dbType`,
// `schemaVersion`, `switchDatabase`). Unknown fields are rejected.

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTemplate {
    #[serde(alias = "dbType")]
    db_type: String,
    #[serde(default = "default_schema_version", alias = "schemaVersion")]
    schema_version: u32,
    #[serde(default)]
    root: RawRoot,
    #[serde(default)]
    resolvers: IndexMap<String, RawResolver>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRoot {
    #[serde(default)]
    children: Vec<RawChild>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChild {
    id: Option<String>,
    #[serde(rename = "type")]
    node_type: Option<String>,
    label: Option<String>,
    icon: Option<String>,
    resolver: Option<String>,
    #[serde(default)]
    children: Vec<RawChild>,
    actions: Option<NodeActions>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawResolver {
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(default)]
    sql: String,
    #[serde(default, alias = "switchDatabase")]
    switch_database: bool,
    #[serde(default)]
    params: Vec<String>,
    #[serde(alias = "nodeType")]
    node_type: Option<String>,
    dimension: Option<String>,
    node: RawNode,
}

fn default_kind() -> String {
    "sql".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNode {
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default = "default_label")]
    label: String,
    #[serde(default)]
    icon: String,
    key: String,
    #[serde(default)]
    children: Vec<RawChild>,
    actions: Option<NodeActions>,
}

fn default_label() -> String {
    "{name}".to_string()
}

// ============ decoding ============

fn decode_template(raw: RawTemplate) -> Result<TreeTemplate> {
    let dialect: Dialect = raw.db_type.parse()?;
    let root = decode_children(raw.root.children)?;
    let resolvers = raw
        .resolvers
        .into_iter()
        .map(|(name, def)| {
            let resolver = decode_resolver(&name, def)?;
            Ok((name, resolver))
        })
        .collect::<Result<IndexMap<_, _>>>()?;

    Ok(TreeTemplate {
        dialect,
        schema_version: raw.schema_version,
        root,
        resolvers,
    })
}

fn decode_children(raw: Vec<RawChild>) -> Result<Vec<ChildDef>> {
    raw.into_iter().map(decode_child).collect()
}

fn decode_child(raw: RawChild) -> Result<ChildDef> {
    match (raw.id, raw.resolver) {
        (Some(id), resolver) => Ok(ChildDef::Group {
            node_type: raw.node_type.unwrap_or_else(|| "group".to_string()),
            label: raw.label.unwrap_or_else(|| id.clone()),
            icon: raw.icon.unwrap_or_else(|| "folder".to_string()),
            resolver,
            children: decode_children(raw.children)?,
            actions: raw.actions,
            id,
        }),
        (None, Some(resolver)) => {
            if raw.node_type.is_some()
                || raw.label.is_some()
                || raw.actions.is_some()
                || !raw.children.is_empty()
            {
                return Err(NebulaError::Template(format!(
                    "inline child '{}' must not carry group fields; give it an `id`",
                    resolver
                )));
            }
            Ok(ChildDef::Inline { resolver })
        }
        (None, None) => Err(NebulaError::Template(
            "child entry needs either `id` or `resolver`".to_string(),
        )),
    }
}

fn decode_resolver(name: &str, raw: RawResolver) -> Result<ResolverDef> {
    let kind = match raw.kind.as_str() {
        "sql" => ResolverKind::Sql,
        "legacy" => ResolverKind::Legacy,
        other => {
            return Err(NebulaError::Template(format!(
                "resolver '{}': unknown kind '{}'",
                name, other
            )));
        }
    };

    let node_type = raw
        .node_type
        .as_deref()
        .map(str::parse::<LegacyNodeType>)
        .transpose()?;

    let dimension = match raw.dimension {
        Some(dim) => dim,
        None => key_dimension(&raw.node.key)
            .map(str::to_string)
            .ok_or_else(|| {
                NebulaError::Template(format!(
                    "resolver '{}': node key '{}' names no dimension",
                    name, raw.node.key
                ))
            })?,
    };

    Ok(ResolverDef {
        name: name.to_string(),
        kind,
        sql: raw.sql,
        switch_database: raw.switch_database,
        params: raw.params,
        node_type,
        dimension,
        node: NodeDef {
            node_type: raw.node.node_type,
            label: raw.node.label,
            icon: raw.node.icon,
            key: raw.node.key,
            children: decode_children(raw.node.children)?,
            actions: raw.node.actions,
        },
    })
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
