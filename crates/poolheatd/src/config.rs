//! Configuration file parsing and structures.
//!
//! poolheatd uses TOML for declarative configuration. Each native integration
//! owns a statically typed section under `[integrations]`.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

use crate::integrations::omnilogic::OmniLogicConfig;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP API; the server is not started when the section is absent
    #[serde(default)]
    pub api: Option<ApiConfig>,

    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"poolheatd::api" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build the subscriber filter: `level` everywhere, `overrides` per target
    pub fn targets(&self) -> Targets {
        self.overrides.iter().fold(
            Targets::new().with_default(LevelFilter::from(self.level)),
            |targets, (target, level)| targets.with_target(target.clone(), LevelFilter::from(*level)),
        )
    }
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8565
}

/// Native HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    /// Native OmniLogic integration
    #[serde(default)]
    pub omnilogic: Option<OmniLogicConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        toml::from_str(&contents).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.api.is_none());
        assert!(config.integrations.omnilogic.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [logging]
            level = "warn"

            [logging.overrides]
            "poolheatd::integrations" = "debug"

            [api]
            port = 9000

            [integrations.omnilogic]
            snapshot = "/var/lib/poolheatd/snapshot.json"
            poll_interval_secs = 30
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(
            config.logging.overrides.get("poolheatd::integrations"),
            Some(&LogLevel::Debug)
        );

        let api = config.api.unwrap();
        assert_eq!(api.listen, "127.0.0.1");
        assert_eq!(api.port, 9000);

        let omnilogic = config.integrations.omnilogic.unwrap();
        assert!(omnilogic.enabled);
        assert_eq!(
            omnilogic.snapshot,
            PathBuf::from("/var/lib/poolheatd/snapshot.json")
        );
        assert_eq!(omnilogic.poll_interval_secs, Some(30));
    }

    #[test]
    fn test_disabled_integration() {
        let toml = r#"
            [integrations.omnilogic]
            enabled = false
            snapshot = "snapshot.json"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        let omnilogic = config.integrations.omnilogic.unwrap();
        assert!(!omnilogic.enabled);
        assert_eq!(omnilogic.poll_interval_secs, None);
    }

    #[test]
    fn test_omnilogic_requires_snapshot() {
        let err = toml::from_str::<Config>("[integrations.omnilogic]\n").unwrap_err();
        assert!(err.to_string().contains("snapshot"));
    }

    #[test]
    fn test_logging_targets() {
        let mut logging = LoggingConfig {
            level: LogLevel::Warn,
            ..Default::default()
        };
        logging
            .overrides
            .insert("poolheatd::api".to_string(), LogLevel::Trace);

        let targets = logging.targets();
        assert_eq!(targets.default_level(), Some(LevelFilter::WARN));
        assert!(targets.would_enable("poolheatd::api", &tracing::Level::TRACE));
        assert!(!targets.would_enable("poolheatd::engine", &tracing::Level::INFO));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poolheatd.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);

        assert!(matches!(
            Config::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_, _))
        ));

        std::fs::write(&path, "[logging\n").unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse(_))));
    }
}
