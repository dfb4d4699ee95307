//! explicit, identifier-keyed collection of validated model configurations.
//!
//! Nothing here decides which model is "current" - callers always name the
//! model they want.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use crate::config::{ModelConfiguration, ModelId};
use crate::error::{ConfigError, Result, RiskError};

/// bundles compiled into the binary: (source name, toml text)
const BUILTIN_BUNDLES: &[(&str, &str)] = &[
    ("models/ibtr-0.1.toml", include_str!("../models/ibtr-0.1.toml")),
    ("models/ibtr-1.0.toml", include_str!("../models/ibtr-1.0.toml")),
];

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<ModelId, Arc<ModelConfiguration>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// registry holding every bundled model
    pub fn builtin() -> std::result::Result<Self, ConfigError> {
        let mut registry = Self::new();
        for (source_name, text) in BUILTIN_BUNDLES {
            registry.insert(ModelConfiguration::from_toml_str(source_name, text)?)?;
        }
        Ok(registry)
    }

    /// load every `*.toml` bundle in a directory (non-recursive, sorted by file name)
    pub fn load_dir(dir: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let mut registry = Self::new();
        registry.extend_from_dir(dir)?;
        Ok(registry)
    }

    /// add the bundles of a directory to this registry; ids must not clash
    pub fn extend_from_dir(&mut self, dir: impl AsRef<Path>) -> std::result::Result<(), ConfigError> {
        let dir = dir.as_ref();
        let io_err = |e: std::io::Error| ConfigError::io(dir.display().to_string(), e.to_string());

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            debug!("loading model bundle {}", path.display());
            self.insert(ModelConfiguration::load(&path)?)?;
        }
        Ok(())
    }

    /// publish a validated configuration under its own id
    pub fn insert(&mut self, config: ModelConfiguration) -> std::result::Result<(), ConfigError> {
        let id = config.id().clone();
        if self.models.contains_key(&id) {
            return Err(ConfigError::DuplicateModel { id: id.to_string() });
        }
        info!(
            "registered model {} ({} predictors, {} horizons)",
            id,
            config.n_predictors(),
            config.horizons().len()
        );
        self.models.insert(id, Arc::new(config));
        Ok(())
    }

    pub fn get(&self, id: &ModelId) -> Option<Arc<ModelConfiguration>> {
        self.models.get(id).cloned()
    }

    /// look a model up by its `name@version` string
    pub fn select(&self, raw_id: &str) -> Result<Arc<ModelConfiguration>> {
        let id: ModelId = raw_id.parse()?;
        self.get(&id).ok_or_else(|| RiskError::unknown_model(raw_id))
    }

    /// ids in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &ModelId> + '_ {
        self.models.keys()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
