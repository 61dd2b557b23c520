//! Configuration file parsing and structures.
//!
//! homesim reads an optional TOML file. Every table and field has a default,
//! so an empty (or absent) file runs the simulation with its stock settings.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

use crate::engine::BurstTiming;
use crate::engine::EngineSettings;

/// Config file looked up when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "homesim.toml";

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
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
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: LogLevel,

    /// Per-target levels, e.g. `"homesim::api" = "debug"`
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build a target filter from the default level and overrides
    pub fn filter(&self) -> Targets {
        Targets::new()
            .with_default(self.level)
            .with_targets(self.overrides.iter().map(|(target, level)| (target.clone(), *level)))
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Where the simulation document lives
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the JSON state file
    pub path: PathBuf,

    /// Keep state in memory only; nothing survives a restart
    pub memory: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data.json"),
            memory: false,
        }
    }
}

/// Simulation timing and retention
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds between scheduled ticks
    pub tick_interval_secs: u64,

    /// Range `[min, max)` of seconds between arming a motion burst and firing it
    pub burst_arm_delay_secs: [u64; 2],

    /// Range `[min, max)` of milliseconds a motion burst stays active
    pub burst_active_ms: [u64; 2],

    /// Maximum entries kept per history; unbounded when unset
    pub max_history: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 180,
            burst_arm_delay_secs: [180, 300],
            burst_active_ms: [1000, 5000],
            max_history: None,
        }
    }
}

impl SimulationConfig {
    /// Convert to engine settings
    pub fn engine_settings(&self) -> EngineSettings {
        let [arm_min, arm_max] = self.burst_arm_delay_secs;
        let [active_min, active_max] = self.burst_active_ms;
        EngineSettings {
            tick_interval: Duration::from_secs(self.tick_interval_secs),
            burst: BurstTiming {
                arm_delay: Duration::from_secs(arm_min)..Duration::from_secs(arm_max),
                active: Duration::from_millis(active_min)..Duration::from_millis(active_max),
            },
            max_history: self.max_history,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        let config: Config = toml::from_str(&contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the given file, or the default file if present, or built-in defaults.
    ///
    /// An explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if sim.tick_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "simulation.tick_interval_secs must be at least 1".to_string(),
            ));
        }

        let [arm_min, arm_max] = sim.burst_arm_delay_secs;
        if arm_min >= arm_max {
            return Err(ConfigError::Invalid(format!(
                "simulation.burst_arm_delay_secs must be an increasing range, got [{}, {}]",
                arm_min, arm_max
            )));
        }

        let [active_min, active_max] = sim.burst_active_ms;
        if active_min >= active_max {
            return Err(ConfigError::Invalid(format!(
                "simulation.burst_active_ms must be an increasing range, got [{}, {}]",
                active_min, active_max
            )));
        }

        if sim.max_history == Some(0) {
            return Err(ConfigError::Invalid(
                "simulation.max_history must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.store.path, PathBuf::from("data.json"));
        assert!(!config.store.memory);
        assert_eq!(config.simulation.tick_interval_secs, 180);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [server]
            listen = "0.0.0.0"
            port = 8080

            [store]
            path = "/var/lib/homesim/state.json"

            [simulation]
            tick_interval_secs = 60
            burst_arm_delay_secs = [10, 20]
            burst_active_ms = [500, 800]
            max_history = 100

            [logging]
            level = "debug"

            [logging.overrides]
            "homesim::api" = "trace"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.path, PathBuf::from("/var/lib/homesim/state.json"));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(
            config.logging.overrides.get("homesim::api"),
            Some(&LogLevel::Trace)
        );

        let settings = config.simulation.engine_settings();
        assert_eq!(settings.tick_interval, Duration::from_secs(60));
        assert_eq!(
            settings.burst.arm_delay,
            Duration::from_secs(10)..Duration::from_secs(20)
        );
        assert_eq!(
            settings.burst.active,
            Duration::from_millis(500)..Duration::from_millis(800)
        );
        assert_eq!(settings.max_history, Some(100));
    }

    #[test]
    fn test_default_settings_match_engine_defaults() {
        assert_eq!(
            SimulationConfig::default().engine_settings(),
            EngineSettings::default()
        );
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.simulation.tick_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.simulation.burst_arm_delay_secs = [300, 300];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("burst_arm_delay_secs"));

        let mut config = Config::default();
        config.simulation.burst_active_ms = [5000, 1000];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.simulation.max_history = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_table_rejected() {
        let result: Result<Config, _> = toml::from_str("[integrations]\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("homesim.toml");
        std::fs::write(&path, "[server]\nport = 4000\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.listen, "127.0.0.1");
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("homesim.toml");
        std::fs::write(&path, "[simulation]\ntick_interval_secs = 0\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file_error() {
        let missing_path = PathBuf::from("/nonexistent/homesim.toml");

        let err = Config::load(Some(&missing_path)).unwrap_err();
        let err_msg = err.to_string();
        assert!(err_msg.contains("Failed to read"), "Error should mention read failure");
        assert!(err_msg.contains("/nonexistent/homesim.toml"), "Error should include file path");
    }
}
