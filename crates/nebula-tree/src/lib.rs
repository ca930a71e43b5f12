//! Nebula Tree - Declarative metadata tree expansion
//!
//! Turns an opaque node key into the children of that node, for any
//! supported dialect, driven by data rather than per-dialect code paths.
//!
//! # Architecture
//!
//! ```text
//! TreeService            list_children / expand / test_connection
//!     ↓
//! Context ← node key     dimension=value/dimension=value/...
//!     ↓
//! TemplateRegistry       per-dialect TreeTemplate (built-in + overrides)
//!     ↓
//! ResolverEngine         sql and legacy resolvers, row → TreeNode mapping
//!     ↓
//! PoolManager            one pooled executor per (connection, database)
//! ```
//!
//! Keys produced by one expansion are valid input to the next: building a
//! key from a context and parsing it back yields the same context.

mod context;
mod node;
mod registry;
mod resolver;
mod service;
mod template;

pub mod legacy;

pub use context::Context;
pub use legacy::{LegacyMetadataProvider, LegacyNodeType, LegacyRow};
pub use node::{NodeAction, NodeActions, TreeNode};
pub use registry::TemplateRegistry;
pub use resolver::{BoundSql, ResolverEngine, bind_params, interpolate};
pub use service::{CONNECTED_MESSAGE, TreeService};
pub use template::{ChildDef, Expansion, NodeDef, ResolverDef, ResolverKind, TreeTemplate};
