//! Configuration management for the schema model
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (entity-schemas.toml)
//! - Environment variables (ENTITY_SCHEMAS__*)
//!
//! ## Example config file (entity-schemas.toml):
//! ```toml
//! [cache]
//! sweep_interval_secs = 60
//! retention_secs = 14400
//!
//! [schema]
//! evolution_modes = ["ADDING_ATTRIBUTES", "ADDING_LOCALES"]
//! catalog_evolution_modes = []
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::schema::{CatalogEvolutionMode, CatalogSchema, EntitySchema, EvolutionMode};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Schema cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Defaults for newly created schemas
    #[serde(default)]
    pub schema: SchemaDefaultsConfig,
}

/// Schema cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Minimal pause between two obsolescence sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Entries unused for longer than this are evicted by a sweep
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

/// Evolution modes new, empty schemas start with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefaultsConfig {
    #[serde(default = "default_evolution_modes")]
    pub evolution_modes: BTreeSet<EvolutionMode>,

    #[serde(default = "default_catalog_evolution_modes")]
    pub catalog_evolution_modes: BTreeSet<CatalogEvolutionMode>,
}

// Default value functions
fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_retention_secs() -> u64 {
    4 * 60 * 60
}

fn default_evolution_modes() -> BTreeSet<EvolutionMode> {
    EvolutionMode::ALL.into_iter().collect()
}

fn default_catalog_evolution_modes() -> BTreeSet<CatalogEvolutionMode> {
    CatalogEvolutionMode::ALL.into_iter().collect()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            retention_secs: default_retention_secs(),
        }
    }
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl Default for SchemaDefaultsConfig {
    fn default() -> Self {
        Self {
            evolution_modes: default_evolution_modes(),
            catalog_evolution_modes: default_catalog_evolution_modes(),
        }
    }
}

impl SchemaDefaultsConfig {
    /// An empty entity schema with the configured evolution modes
    pub fn new_entity_schema(&self, name: impl Into<String>) -> EntitySchema {
        EntitySchema::with_evolution(name, self.evolution_modes.iter().copied())
    }

    /// An empty catalog schema with the configured evolution modes
    pub fn new_catalog_schema(&self, name: impl Into<String>) -> CatalogSchema {
        CatalogSchema::with_evolution(name, self.catalog_evolution_modes.iter().copied())
    }
}

impl ModelConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "entity-schemas.toml",
            ".entity-schemas.toml",
            "config/entity-schemas.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "entity-schemas", "entity-schemas") {
            let xdg_config = config_dir.config_dir().join("entity-schemas.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (ENTITY_SCHEMAS__CACHE__RETENTION_SECS, ...)
        builder = builder.add_source(
            Environment::with_prefix("ENTITY_SCHEMAS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = self
            .to_toml()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
