//! Connection profiles and the store that owns them

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Dialect, Result};

/// A stored connection profile.
///
/// Owned by the profile store; read-only to the tree and pool layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "dbType")]
    pub dialect: Dialect,
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number (0 for the dialect default)
    #[serde(default)]
    pub port: u16,
    /// Default database, used when a request names no target database
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// `None` means "keep the stored password"; `Some("")` is a blank password
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Driver-specific extras (e.g. `ssl_mode`, `trust_cert`)
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

impl ConnectionProfile {
    pub fn new(id: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            dialect,
            host: default_host(),
            port: 0,
            database: None,
            username: None,
            password: None,
            parent_id: None,
            params: HashMap::new(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Port to dial, falling back to the dialect default
    pub fn effective_port(&self) -> u16 {
        if self.port > 0 {
            self.port
        } else {
            self.dialect.default_port()
        }
    }

    /// Resolve the database a pool should target.
    ///
    /// An empty or missing target falls back to the profile default.
    pub fn target_database(&self, requested: Option<&str>) -> String {
        requested
            .filter(|db| !db.is_empty())
            .map(str::to_string)
            .or_else(|| self.database.clone().filter(|db| !db.is_empty()))
            .unwrap_or_default()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn param_flag(&self, key: &str) -> bool {
        self.param(key)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
    }
}

/// Read access to stored connection profiles
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<ConnectionProfile>>;

    async fn all_for_parent(&self, parent_id: Option<&str>) -> Result<Vec<ConnectionProfile>>;
}

/// Process-local profile store backed by a map
#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, ConnectionProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = ConnectionProfile>) -> Self {
        let store = Self::new();
        for profile in profiles {
            store.upsert(profile);
        }
        store
    }

    /// Parse a JSON array of profiles
    pub fn from_json(json: &str) -> Result<Self> {
        let profiles: Vec<ConnectionProfile> = serde_json::from_str(json)?;
        Ok(Self::from_profiles(profiles))
    }

    pub fn upsert(&self, profile: ConnectionProfile) {
        self.profiles.write().insert(profile.id.clone(), profile);
    }

    pub fn remove(&self, id: &str) -> Option<ConnectionProfile> {
        self.profiles.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<ConnectionProfile>> {
        Ok(self.profiles.read().get(id).cloned())
    }

    async fn all_for_parent(&self, parent_id: Option<&str>) -> Result<Vec<ConnectionProfile>> {
        let mut children: Vec<ConnectionProfile> = self
            .profiles
            .read()
            .values()
            .filter(|p| p.parent_id.as_deref() == parent_id)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(children)
    }
}
