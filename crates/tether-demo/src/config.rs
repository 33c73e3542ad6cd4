//! Demo configuration.
//!
//! Configuration can be loaded from:
//! - TOML configuration file (`tether.toml`)
//! - `TETHER_LOG`, the default log filter when `[logging]` is absent

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tether_core::CenterConfig;

/// Demo configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Event center configuration.
    #[serde(default)]
    pub center: CenterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Scenario configuration.
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter, used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Install a Prometheus recorder and print a snapshot at exit.
    #[serde(default)]
    pub enabled: bool,
}

/// Scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Number of players.
    #[serde(default = "default_players")]
    pub players: usize,

    /// Number of scoring rounds.
    #[serde(default = "default_rounds")]
    pub rounds: usize,
}

// Default value functions
fn default_log_filter() -> String {
    std::env::var("TETHER_LOG").unwrap_or_else(|_| "tether=info,tether_core=debug".to_string())
}

fn default_players() -> usize {
    3
}

fn default_rounds() -> usize {
    2
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            players: default_players(),
            rounds: default_rounds(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "tether.toml",
            "/etc/tether/tether.toml",
            "~/.config/tether/tether.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults; TETHER_LOG still applies
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .center
            .validate()
            .with_context(|| format!("Invalid [center] section in {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.center.global_suffix, "-GlobalEvent");
        assert_eq!(config.demo.players, 3);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [center]
            global_suffix = "@any"

            [demo]
            rounds = 5

            [metrics]
            enabled = true
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.center.global_suffix, "@any");
        assert!(config.center.prune_empty_channels);
        assert_eq!(config.demo.rounds, 5);
        assert_eq!(config.demo.players, 3);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_config_from_missing_file() {
        let err = Config::from_file("/nonexistent/tether.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
