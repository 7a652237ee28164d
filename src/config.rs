//! Pipeline configuration, loaded from TOML.

use crate::content_type::DEFAULT_API_PREFIX;
use crate::error::ConfigError;
use crate::gzip::DEFAULT_MIN_TEXT_LEN;
use crate::locale::{Locale, StaticCatalog};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the stages assembled by [`StageLayer`](crate::StageLayer).
///
/// Every field has a default, so an empty document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Path prefix identifying API requests.
    pub api_prefix: String,
    /// Length, in characters, a text body must exceed to be gzipped.
    pub gzip_min_text_len: usize,
    /// Locale used when negotiation finds no match.
    pub default_locale: String,
    /// Locales the server has translations for.
    pub available_locales: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            gzip_min_text_len: DEFAULT_MIN_TEXT_LEN,
            default_locale: "en".to_string(),
            available_locales: vec!["en".to_string()],
        }
    }
}

impl PipelineConfig {
    /// Reads and validates a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_prefix.is_empty() {
            return Err(ConfigError::Invalid("api_prefix must not be empty"));
        }
        self.catalog()?;
        Ok(())
    }

    /// Builds the locale catalog described by this config.
    pub fn catalog(&self) -> Result<StaticCatalog, ConfigError> {
        let default = Locale::parse(&self.default_locale)?;
        let available = self
            .available_locales
            .iter()
            .map(|tag| Locale::parse(tag))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StaticCatalog::new(default, available))
    }
}
