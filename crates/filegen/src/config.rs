//! Configuration loading and types

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use filegen_core::{BackoffConfig, Machine, ManagerConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the filegen daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Daemon settings
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Manager tuning
    #[serde(default)]
    pub manager: ManagerSettings,
    /// Machines and their computed files
    #[serde(default)]
    pub machine: Vec<Machine>,
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Directory for fetched objects; objects are kept in memory when unset
    #[serde(default)]
    pub object_dir: Option<PathBuf>,
    /// Address to serve Prometheus metrics on
    #[serde(default)]
    pub metrics_bind: Option<SocketAddr>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            object_dir: None,
            metrics_bind: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Overrides for the manager's built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagerSettings {
    pub source_queue_capacity: Option<usize>,
    pub manifest_channel_capacity: Option<usize>,
    pub initial_retry_ms: Option<u64>,
    pub max_retry_secs: Option<u64>,
    pub dial_timeout_secs: Option<u64>,
}

impl ManagerSettings {
    /// Fill unset fields from the manager's defaults
    ///
    /// # Errors
    /// Returns error if any configured value is zero
    pub fn to_manager_config(&self) -> eyre::Result<ManagerConfig> {
        let nonzero = [
            ("source_queue_capacity", self.source_queue_capacity.map(|v| v as u64)),
            ("manifest_channel_capacity", self.manifest_channel_capacity.map(|v| v as u64)),
            ("initial_retry_ms", self.initial_retry_ms),
            ("max_retry_secs", self.max_retry_secs),
            ("dial_timeout_secs", self.dial_timeout_secs),
        ];
        for (name, value) in nonzero {
            if value == Some(0) {
                eyre::bail!("manager.{name} must be greater than zero");
            }
        }

        let defaults = ManagerConfig::default();
        Ok(ManagerConfig {
            source_queue_capacity: self
                .source_queue_capacity
                .unwrap_or(defaults.source_queue_capacity),
            manifest_channel_capacity: self
                .manifest_channel_capacity
                .unwrap_or(defaults.manifest_channel_capacity),
            backoff: BackoffConfig {
                initial: self
                    .initial_retry_ms
                    .map_or(defaults.backoff.initial, Duration::from_millis),
                max: self
                    .max_retry_secs
                    .map_or(defaults.backoff.max, Duration::from_secs),
            },
            dial_timeout: self
                .dial_timeout_secs
                .map_or(defaults.dial_timeout, Duration::from_secs),
        })
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from an explicit path, `FILEGEN_CONFIG`, default paths, or defaults
    ///
    /// # Errors
    /// Returns error if a config file is found but cannot be loaded
    pub fn discover(explicit: Option<&Path>) -> eyre::Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        if let Ok(path) = std::env::var("FILEGEN_CONFIG") {
            let path = PathBuf::from(path);
            return Ok((Self::load(&path)?, Some(path)));
        }

        let mut paths = vec![
            PathBuf::from("filegen.toml"),
            PathBuf::from("/etc/filegen/filegen.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("filegen/filegen.toml"));
        }

        for path in paths {
            if path.exists() {
                return Ok((Self::load(&path)?, Some(path)));
            }
        }

        Ok((Config::default(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.daemon.log_level, "info");
        assert_eq!(config.daemon.log_format, LogFormat::Pretty);
        assert!(config.machine.is_empty());

        let manager = config.manager.to_manager_config().unwrap();
        assert_eq!(manager.source_queue_capacity, 4096);
        assert_eq!(manager.backoff, BackoffConfig::default());
        assert_eq!(manager.dial_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_full_config() {
        let config: Config = toml::from_str(
            r#"
            [daemon]
            log_level = "debug"
            log_format = "json"
            object_dir = "/var/lib/filegen/objects"
            metrics_bind = "127.0.0.1:9185"

            [manager]
            initial_retry_ms = 250
            max_retry_secs = 30

            [[machine]]
            hostname = "web-1"

            [[machine.computed_file]]
            pathname = "/etc/motd"
            source = "gen1:6972"

            [[machine.computed_file]]
            pathname = "/etc/ssl/ca.pem"
            source = "gen2:6972"

            [[machine]]
            hostname = "db-1"
            "#,
        )
        .unwrap();

        assert_eq!(config.daemon.log_format, LogFormat::Json);
        assert_eq!(
            config.daemon.object_dir.as_deref(),
            Some(Path::new("/var/lib/filegen/objects"))
        );
        assert_eq!(
            config.daemon.metrics_bind,
            Some("127.0.0.1:9185".parse().unwrap())
        );

        let manager = config.manager.to_manager_config().unwrap();
        assert_eq!(manager.backoff.initial, Duration::from_millis(250));
        assert_eq!(manager.backoff.max, Duration::from_secs(30));
        assert_eq!(manager.manifest_channel_capacity, 16);

        assert_eq!(config.machine.len(), 2);
        assert_eq!(config.machine[0].hostname(), "web-1");
        assert_eq!(config.machine[0].computed_files.len(), 2);
        assert!(config.machine[1].computed_files.is_empty());
    }

    #[test]
    fn test_zero_values_are_rejected() {
        for setting in [
            "source_queue_capacity = 0",
            "manifest_channel_capacity = 0",
            "initial_retry_ms = 0",
            "max_retry_secs = 0",
            "dial_timeout_secs = 0",
        ] {
            let config: Config = toml::from_str(&format!("[manager]\n{setting}\n")).unwrap();
            let err = config.manager.to_manager_config().unwrap_err();
            assert!(err.to_string().contains("greater than zero"), "{setting}: {err}");
        }

        let config: Config = toml::from_str("[manager]\nmanifest_channel_capacity = 1\n").unwrap();
        assert_eq!(
            config.manager.to_manager_config().unwrap().manifest_channel_capacity,
            1
        );
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filegen.toml");
        std::fs::write(&path, "[daemon]\nlog_level = \"warn\"\n").unwrap();

        let (config, found) = Config::discover(Some(&path)).unwrap();

        assert_eq!(config.daemon.log_level, "warn");
        assert_eq!(found.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filegen.toml");
        std::fs::write(&path, "[[machine]]\ncomputed_file = 3\n").unwrap();

        assert!(Config::load(&path).is_err());
    }
}
