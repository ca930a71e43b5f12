//! Tree node produced by every expansion

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value as Json, json};

use crate::context::Context;

/// One node of the virtual metadata tree.
///
/// Built fresh on every expansion and never mutated afterwards. `key` is a
/// node key that can be handed back verbatim to list this node's children.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub key: String,
    pub node_type: String,
    pub label: String,
    pub icon: String,
    pub has_children: bool,
    /// Every context dimension plus the raw row columns
    pub meta: IndexMap<String, Json>,
    /// No backing row; a pure grouping node
    pub is_virtual: bool,
    pub actions: Option<NodeActions>,
}

/// Actions a client offers on a node: one on activation, the rest in its
/// context menu. Handlers are names the client dispatches; nothing here
/// executes them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeActions {
    pub primary: Option<NodeAction>,
    #[serde(default)]
    pub menu: Vec<NodeAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeAction {
    pub label: Option<String>,
    pub icon: Option<String>,
    pub handler: Option<String>,
    /// `separator` for menu dividers
    #[serde(rename = "type")]
    pub action_type: Option<String>,
    /// e.g. `danger`
    pub variant: Option<String>,
}

impl NodeAction {
    fn to_json(&self) -> Json {
        let mut out = Map::new();
        let fields = [
            ("label", &self.label),
            ("icon", &self.icon),
            ("handler", &self.handler),
            ("type", &self.action_type),
            ("variant", &self.variant),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                out.insert(name.to_string(), Json::String(value.clone()));
            }
        }
        Json::Object(out)
    }
}

impl NodeActions {
    pub fn to_json(&self) -> Json {
        json!({
            "primary": self.primary.as_ref().map(NodeAction::to_json),
            "menu": self.menu.iter().map(NodeAction::to_json).collect::<Vec<_>>(),
        })
    }
}

impl TreeNode {
    /// Synthetic node returned in place of a listing that failed
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            key: "error".to_string(),
            node_type: "error".to_string(),
            label: message.into(),
            icon: "error".to_string(),
            has_children: false,
            meta: IndexMap::new(),
            is_virtual: false,
            actions: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.node_type == "error"
    }

    pub(crate) fn context_meta(ctx: &Context) -> IndexMap<String, Json> {
        ctx.iter()
            .map(|(dim, value)| (dim.to_string(), Json::String(value.to_string())))
            .collect()
    }

    /// Wire shape consumed by the tree UI. `actions` is present only when
    /// the template attached some.
    pub fn to_json(&self) -> Json {
        let meta: Map<String, Json> = self
            .meta
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut out = json!({
            "key": self.key,
            "type": self.node_type,
            "label": self.label,
            "icon": self.icon,
            "hasChildren": self.has_children,
            "meta": meta,
            "virtual": self.is_virtual,
        });
        if let (Some(actions), Json::Object(fields)) = (&self.actions, &mut out) {
            fields.insert("actions".to_string(), actions.to_json());
        }
        out
    }
}
