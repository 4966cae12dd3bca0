//! Engine settings with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/conftree/conftree.toml`
//! 3. Explicit settings file (`--settings`)
//! 4. Environment variables: `CONFTREE_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;

/// Tunables of the loader and resolver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Treat plain `ENV:NAME` scalars as environment lookups
    pub implicit_env: bool,
    /// Treat plain scalars made of quoted/ENV/symbol tokens as concatenations
    pub implicit_concat: bool,
    /// Honour a root-level `extends: base.yaml` key when loading files
    pub legacy_extends_key: bool,
    /// Maximum nesting of placeholder resolution
    pub max_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            implicit_env: true,
            implicit_concat: true,
            legacy_extends_key: true,
            max_depth: 256,
        }
    }
}

/// Get the XDG config directory for conftree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "conftree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("conftree.toml"))
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `explicit` - Optional settings file; must exist when given
    pub fn load(explicit: Option<&Path>) -> Result<Self, ApplicationError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("implicit_env", defaults.implicit_env)
            .map_err(config_err)?
            .set_default("implicit_concat", defaults.implicit_concat)
            .map_err(config_err)?
            .set_default("legacy_extends_key", defaults.legacy_extends_key)
            .map_err(config_err)?
            .set_default("max_depth", defaults.max_depth as i64)
            .map_err(config_err)?;

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("load: global settings {}", global_path.display());
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        if let Some(path) = explicit {
            debug!("load: explicit settings {}", path.display());
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CONFTREE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;
        config.try_deserialize().map_err(config_err)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# conftree configuration
#
# Locations (by precedence, lowest to highest):
#   Global:   ~/.config/conftree/conftree.toml
#   Explicit: --settings <file>
#   Env:      CONFTREE_* environment variables (e.g. CONFTREE_MAX_DEPTH=64)

# Plain scalars like `ENV:HOME` become environment lookups
# implicit_env = true

# Plain scalars like `"prefix/" ENV:HOME app.suffix` become concatenations
# implicit_concat = true

# A root-level `extends: base.yaml` key merges the file over base.yaml
# legacy_extends_key = true

# Maximum nesting of placeholder resolution before giving up
# max_depth = 256
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn given_no_config_when_loading_then_uses_defaults() {
        let settings = Settings::load(None).expect("load defaults");

        assert!(settings.implicit_env);
        assert!(settings.legacy_extends_key);
        assert!(settings.max_depth > 0);
    }

    #[test]
    fn given_explicit_file_when_loading_then_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");
        fs::write(&path, "implicit_concat = false\nmax_depth = 8\n").unwrap();

        let settings = Settings::load(Some(&path)).expect("load explicit");

        assert!(!settings.implicit_concat);
        assert_eq!(settings.max_depth, 8);
        assert!(settings.implicit_env);
    }

    #[test]
    fn given_missing_explicit_file_when_loading_then_config_error() {
        let temp = TempDir::new().unwrap();

        let result = Settings::load(Some(&temp.path().join("absent.toml")));

        assert!(matches!(result, Err(ApplicationError::Config { .. })));
    }

    #[test]
    fn given_settings_when_serialized_then_roundtrips_through_toml() {
        let settings = Settings {
            max_depth: 12,
            ..Settings::default()
        };

        let text = settings.to_toml().unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();

        assert_eq!(parsed, settings);
        assert!(Settings::template().contains("max_depth"));
    }
}
