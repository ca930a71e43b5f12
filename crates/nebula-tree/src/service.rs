//! Tree browsing service
//!
//! The surface an HTTP or CLI layer talks to: node expansion, the legacy
//! listing contract, connectivity tests and profile lifecycle hooks.

use std::sync::Arc;

use nebula_connection::PoolManager;
use nebula_core::{ConnectionProfile, Dialect, NebulaError, ProfileStore, Result};
use nebula_drivers::DriverRegistry;

use crate::context::Context;
use crate::legacy::{self, LegacyNodeType, LegacyRow};
use crate::node::TreeNode;
use crate::registry::TemplateRegistry;
use crate::resolver::ResolverEngine;
use crate::template::{Expansion, TreeTemplate};

/// Message returned by a successful `test_connection`
pub const CONNECTED_MESSAGE: &str = "Connected successfully!";

/// Service for metadata tree expansion
///
/// This service ties together:
/// - Template lookup per dialect via TemplateRegistry
/// - Key parsing and expansion planning
/// - Resolver execution against cached pools via PoolManager
pub struct TreeService {
    templates: Arc<TemplateRegistry>,
    pools: Arc<PoolManager>,
    engine: ResolverEngine,
}

impl TreeService {
    /// Create a tree service over an existing pool manager
    ///
    /// # Arguments
    ///
    /// * `templates` - Loaded template registry, read-only from here on
    /// * `pools` - Pool manager shared with any other consumer of the cache
    pub fn new(templates: Arc<TemplateRegistry>, pools: Arc<PoolManager>) -> Self {
        Self {
            engine: ResolverEngine::new(Arc::clone(&pools)),
            templates,
            pools,
        }
    }

    /// Build the service and its pool manager from the collaborators
    pub fn from_parts(
        profiles: Arc<dyn ProfileStore>,
        drivers: DriverRegistry,
        templates: TemplateRegistry,
    ) -> Self {
        Self::new(
            Arc::new(templates),
            Arc::new(PoolManager::new(profiles, drivers)),
        )
    }

    pub fn pools(&self) -> &Arc<PoolManager> {
        &self.pools
    }

    pub fn templates(&self) -> &Arc<TemplateRegistry> {
        &self.templates
    }

    async fn profile(&self, connection_id: &str) -> Result<ConnectionProfile> {
        self.pools
            .profiles()
            .find_by_id(connection_id)
            .await?
            .ok_or_else(|| NebulaError::ConnectionNotFound(connection_id.to_string()))
    }

    fn template(&self, dialect: Dialect) -> Result<Arc<TreeTemplate>> {
        self.templates
            .template_for(dialect)
            .ok_or_else(|| NebulaError::UnsupportedDialect(dialect.to_string()))
    }

    /// List the children of the node identified by `key`
    ///
    /// `""` lists the root. Query and pool failures are reported in-band as
    /// a single error node so the caller can render them in place; unknown
    /// connections and dialects are returned as errors.
    #[tracing::instrument(skip(self), fields(connection_id = %connection_id))]
    pub async fn list_children(&self, connection_id: &str, key: &str) -> Result<Vec<TreeNode>> {
        let ctx = Context::parse(key);
        let profile = self.profile(connection_id).await?;
        let template = self.template(profile.dialect)?;

        let expanded = match template.plan(&ctx) {
            Expansion::Children(children) => {
                self.engine
                    .expand_children(&profile, &template, &ctx, children)
                    .await
            }
            Expansion::Resolver(resolver) => self.engine.run(&profile, &ctx, resolver).await,
            Expansion::Empty => Ok(Vec::new()),
        };

        match expanded {
            Ok(nodes) => {
                tracing::debug!(count = nodes.len(), "listed children");
                Ok(nodes)
            }
            Err(e) if e.is_recoverable_in_listing() => {
                tracing::warn!(error = %e, "listing failed, returning error node");
                Ok(vec![TreeNode::error(e.detail())])
            }
            Err(e) => Err(e),
        }
    }

    /// Run one named resolver for `ctx`
    ///
    /// Unlike `list_children` a failing query is returned as
    /// `QueryExecutionFailed`.
    #[tracing::instrument(skip(self, ctx), fields(connection_id = %connection_id))]
    pub async fn expand(
        &self,
        connection_id: &str,
        ctx: &Context,
        resolver: &str,
    ) -> Result<Vec<TreeNode>> {
        let profile = self.profile(connection_id).await?;
        let template = self.template(profile.dialect)?;
        let def = template.resolver(resolver).ok_or_else(|| {
            NebulaError::NotFound(format!("resolver '{}' for {}", resolver, profile.dialect))
        })?;
        self.engine.run(&profile, ctx, def).await
    }

    /// List legacy objects of `node_type` under `path`
    ///
    /// `path` is `database/schema/table`, as deep as the node type needs;
    /// leading and trailing slashes are ignored.
    #[tracing::instrument(skip(self), fields(connection_id = %connection_id))]
    pub async fn list_legacy_children(
        &self,
        connection_id: &str,
        node_type: &str,
        path: &str,
    ) -> Result<Vec<LegacyRow>> {
        let node_type: LegacyNodeType = node_type.parse()?;
        let profile = self.profile(connection_id).await?;
        let segments: Vec<String> = path
            .trim_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        let exec = self
            .pools
            .acquire(connection_id, segments.first().map(String::as_str))
            .await?;
        legacy::provider_for(profile.dialect)
            .list_children(connection_id, &exec, node_type, &segments)
            .await
    }

    /// Test connectivity for a profile without touching the pool cache
    ///
    /// A `None` password is taken from the stored profile with the same id,
    /// so an edit form can test without re-entering it.
    ///
    /// # Returns
    ///
    /// `CONNECTED_MESSAGE` on success, otherwise `PoolCreationFailed` with the
    /// driver's message
    #[tracing::instrument(skip(self, profile), fields(connection_id = %profile.id))]
    pub async fn test_connection(&self, mut profile: ConnectionProfile) -> Result<String> {
        if profile.password.is_none()
            && let Ok(Some(stored)) = self.pools.profiles().find_by_id(&profile.id).await
        {
            profile.password = stored.password;
        }

        let outcome = self
            .pools
            .with_temporary(&profile, |exec| async move {
                exec.query_rows(exec.validation_query(), &[]).await.map(|_| ())
            })
            .await;

        match outcome {
            Ok(()) => {
                tracing::info!("connection test succeeded");
                Ok(CONNECTED_MESSAGE.to_string())
            }
            Err(e) => {
                tracing::warn!(error = %e, "connection test failed");
                Err(NebulaError::PoolCreationFailed(e.detail()))
            }
        }
    }

    /// Close every cached pool of a connection the user disconnected.
    /// Returns how many closed; the next listing reconnects.
    pub async fn disconnect(&self, connection_id: &str) -> usize {
        self.pools.release_all(connection_id).await
    }

    /// Drop every cached pool of an edited profile. Returns how many closed.
    pub async fn on_profile_changed(&self, connection_id: &str) -> usize {
        self.pools.release_all(connection_id).await
    }

    pub async fn on_profile_deleted(&self, connection_id: &str) -> usize {
        self.pools.release_all(connection_id).await
    }

    /// Close every cached pool
    pub async fn shutdown(&self) {
        self.pools.shutdown().await;
    }
}
