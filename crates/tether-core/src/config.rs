//! Event center configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default marker appended to event names on the type-global channel.
pub const DEFAULT_GLOBAL_SUFFIX: &str = "-GlobalEvent";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("Invalid center configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// An empty suffix would put type-global posts on the class-level channel.
    #[error("Global event suffix must not be empty")]
    EmptyGlobalSuffix,
}

/// Event center configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CenterConfig {
    /// Suffix that turns an event name into its type-global channel name.
    #[serde(default = "default_global_suffix")]
    pub global_suffix: String,

    /// Whether to drop an event name's listener list once it is empty.
    #[serde(default = "default_true")]
    pub prune_empty_channels: bool,
}

fn default_global_suffix() -> String {
    DEFAULT_GLOBAL_SUFFIX.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for CenterConfig {
    fn default() -> Self {
        Self {
            global_suffix: default_global_suffix(),
            prune_empty_channels: true,
        }
    }
}

impl CenterConfig {
    /// Parse a configuration from TOML; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML for this structure
    /// or fails [`validate`](Self::validate).
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the center cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyGlobalSuffix`] if `global_suffix` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.global_suffix.is_empty() {
            return Err(ConfigError::EmptyGlobalSuffix);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CenterConfig::default();
        assert_eq!(config.global_suffix, "-GlobalEvent");
        assert!(config.prune_empty_channels);
    }

    #[test]
    fn test_config_from_toml() {
        let config = CenterConfig::from_toml_str(
            r#"
            global_suffix = ":any"
        "#,
        )
        .unwrap();
        assert_eq!(config.global_suffix, ":any");
        assert!(config.prune_empty_channels);

        assert!(CenterConfig::from_toml_str("prune_empty_channels = 3").is_err());
    }

    #[test]
    fn test_empty_global_suffix_rejected() {
        let err = CenterConfig::from_toml_str(r#"global_suffix = """#).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyGlobalSuffix));

        let config = CenterConfig {
            global_suffix: String::new(),
            ..CenterConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(CenterConfig::default().validate().is_ok());
    }
}
