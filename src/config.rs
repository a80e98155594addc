//! Module configuration loaded from TOML.
//!
//! ```toml
//! app_name = "Sandbox"
//!
//! [json_schema]
//! schema_dir = "var/json_schema"
//! validate_dir = "var/json_validate"
//! target_code = 200
//!
//! [logging]
//! level = "debug"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::ResourceError;
use crate::validation::JsonSchemaConfig;

/// Application served when none is configured.
pub const DEFAULT_APP_NAME: &str = "app";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    /// Selects which installed application catalog answers `page://self` and `app://self`.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default)]
    pub json_schema: Option<JsonSchemaConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self::new(DEFAULT_APP_NAME)
    }
}

impl ModuleConfig {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            json_schema: None,
            logging: LoggingConfig::default(),
        }
    }

    pub fn json_schema(mut self, config: JsonSchemaConfig) -> Self {
        self.json_schema = Some(config);
        self
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Config` for malformed TOML or unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ResourceError> {
        toml::from_str(content).map_err(|e| ResourceError::config(e.to_string()))
    }

    /// Load a TOML file; relative schema directories are taken from the
    /// file's own directory.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Config` if the file is missing or malformed.
    pub fn from_file(path: &Path) -> Result<Self, ResourceError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ResourceError::config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&content)?;

        if let (Some(base), Some(schema)) = (path.parent(), config.json_schema.as_mut()) {
            if schema.schema_dir.is_relative() {
                schema.schema_dir = base.join(&schema.schema_dir);
            }
            if schema.validate_dir.is_relative() {
                schema.validate_dir = base.join(&schema.validate_dir);
            }
        }
        Ok(config)
    }
}
