//! Engine configuration

use crate::error::{Error, Result};
use crate::options::{CompileOptions, DEFAULT_DELIMITER, DEFAULT_EXTENSION, DEFAULT_LOCALS_NAME};
use serde::{Deserialize, Serialize};
#[cfg(feature = "config")]
use std::path::Path;

/// Settings an [`Engine`](crate::Engine) is seeded from
///
/// ```toml
/// delimiter = "%"
/// compile_debug = true
/// cache_enabled = true
/// locals_name = "locals"
/// extension = "pjs"
/// debug = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    #[serde(default = "default_true")]
    pub compile_debug: bool,

    #[serde(default)]
    pub cache_enabled: bool,

    #[serde(default = "default_locals_name")]
    pub locals_name: String,

    #[serde(default = "default_extension")]
    pub extension: String,

    /// Log generated step listings
    #[serde(default)]
    pub debug: bool,
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_true() -> bool {
    true
}

fn default_locals_name() -> String {
    DEFAULT_LOCALS_NAME.to_string()
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            compile_debug: true,
            cache_enabled: false,
            locals_name: default_locals_name(),
            extension: default_extension(),
            debug: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    #[cfg(feature = "config")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let content = std::fs::read_to_string(path_ref).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path_ref.display(),
                e
            ))
        })?;

        let config = Self::from_toml_str(&content)?;
        log::debug!("Loaded engine configuration from: {}", path_ref.display());
        Ok(config)
    }

    #[cfg(feature = "config")]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.delimiter_char().map(|_| ())
    }

    fn delimiter_char(&self) -> Result<char> {
        let mut chars = self.delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_whitespace() => Ok(c),
            _ => Err(Error::config(format!(
                "delimiter must be a single non-whitespace character, got {:?}",
                self.delimiter
            ))),
        }
    }

    /// Default compile options described by this configuration
    pub fn compile_options(&self) -> Result<CompileOptions> {
        Ok(CompileOptions::default()
            .with_delimiter(self.delimiter_char()?)
            .with_compile_debug(self.compile_debug)
            .with_cache(self.cache_enabled)
            .with_locals_name(self.locals_name.clone())
            .with_extension(self.extension.clone())
            .with_debug(self.debug))
    }
}
