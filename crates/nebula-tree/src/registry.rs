//! Per-dialect template lookup
//!
//! Built-in templates are compiled in. Dialects without one get the legacy
//! template, which routes every level through the fixed introspection
//! queries. Files in an override directory replace built-ins per dialect.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nebula_core::{Dialect, NebulaError, Result};

use crate::template::TreeTemplate;

const POSTGRESQL_TEMPLATE: &str = include_str!("../templates/postgresql.toml");
const MYSQL_TEMPLATE: &str = include_str!("../templates/mysql.toml");
const LEGACY_TEMPLATE: &str = include_str!("../templates/legacy.toml");

#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<Dialect, Arc<TreeTemplate>>,
}

impl TemplateRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in templates, with the legacy fallback for the remaining dialects
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::empty();
        registry.insert(TreeTemplate::from_toml(POSTGRESQL_TEMPLATE)?);
        registry.insert(TreeTemplate::from_toml(MYSQL_TEMPLATE)?);

        for dialect in Dialect::ALL {
            if !registry.templates.contains_key(&dialect) {
                registry.insert(legacy_template(dialect)?);
            }
        }
        Ok(registry)
    }

    /// Built-ins plus every `*.toml` in `override_dir`
    pub fn load(override_dir: Option<&Path>) -> Result<Self> {
        let mut registry = Self::builtin()?;
        if let Some(dir) = override_dir {
            registry.load_overrides(dir);
        }
        Ok(registry)
    }

    /// `~/.nebula/tree`
    pub fn default_override_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".nebula").join("tree"))
    }

    /// Read override files in file-name order. A file that fails to read or
    /// validate is logged and skipped. Returns how many were applied.
    pub fn load_overrides(&mut self, dir: &Path) -> usize {
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "no template override directory");
            return 0;
        }

        let mut paths: Vec<PathBuf> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
                .collect(),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to read template overrides");
                return 0;
            }
        };
        paths.sort();

        let mut applied = 0;
        for path in paths {
            let template = std::fs::read_to_string(&path)
                .map_err(NebulaError::from)
                .and_then(|source| TreeTemplate::from_toml(&source));
            match template {
                Ok(template) => {
                    tracing::info!(
                        path = %path.display(),
                        dialect = %template.dialect,
                        "loaded template override"
                    );
                    self.insert(template);
                    applied += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping invalid template");
                }
            }
        }
        applied
    }

    /// Register `template`, returning the one it replaced
    pub fn insert(&mut self, template: TreeTemplate) -> Option<Arc<TreeTemplate>> {
        self.templates.insert(template.dialect, Arc::new(template))
    }

    pub fn template_for(&self, dialect: Dialect) -> Option<Arc<TreeTemplate>> {
        self.templates.get(&dialect).cloned()
    }

    pub fn dialects(&self) -> Vec<Dialect> {
        let mut dialects: Vec<Dialect> = self.templates.keys().copied().collect();
        dialects.sort();
        dialects
    }
}

/// The legacy template retargeted at `dialect`
fn legacy_template(dialect: Dialect) -> Result<TreeTemplate> {
    let mut template = TreeTemplate::from_toml(LEGACY_TEMPLATE)?;
    template.dialect = dialect;
    Ok(template)
}
