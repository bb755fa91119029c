//! HomeDaemon configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main HomeDaemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error); overridden by `--log-level`
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Registry actor settings
    pub registry: RegistryConfig,

    /// Local socket settings
    pub ipc: IpcConfig,
}

impl Config {
    /// Reject values the registry cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.registry.gather_timeout_ms == 0 {
            return Err(eyre::eyre!("registry.gather-timeout-ms must be greater than zero"));
        }
        if self.registry.ask_timeout_ms == 0 {
            return Err(eyre::eyre!("registry.ask-timeout-ms must be greater than zero"));
        }
        if self.registry.channel_buffer == 0 {
            return Err(eyre::eyre!("registry.channel-buffer must be greater than zero"));
        }
        if self.registry.ask_timeout_ms <= self.registry.gather_timeout_ms {
            tracing::warn!(
                "registry.ask-timeout-ms ({}) is not above gather-timeout-ms ({}); partial results may be lost",
                self.registry.ask_timeout_ms,
                self.registry.gather_timeout_ms
            );
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./.homedaemon.yml`, then
    /// `<config_dir>/homedaemon/homedaemon.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".homedaemon.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("homedaemon").join("homedaemon.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Registry actor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Deadline for every scatter/gather in milliseconds
    #[serde(rename = "gather-timeout-ms")]
    pub gather_timeout_ms: u64,

    /// Caller-side bound on any registry request in milliseconds
    #[serde(rename = "ask-timeout-ms")]
    pub ask_timeout_ms: u64,

    /// Mailbox capacity of each actor
    #[serde(rename = "channel-buffer")]
    pub channel_buffer: usize,

    /// Reading of a freshly created device
    #[serde(rename = "initial-reading")]
    pub initial_reading: f64,
}

impl RegistryConfig {
    pub fn gather_timeout(&self) -> Duration {
        Duration::from_millis(self.gather_timeout_ms)
    }

    pub fn ask_timeout(&self) -> Duration {
        Duration::from_millis(self.ask_timeout_ms)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            gather_timeout_ms: 3_000,
            ask_timeout_ms: 5_000,
            channel_buffer: 256,
            initial_reading: 25.0,
        }
    }
}

/// Local socket settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Socket path override
    #[serde(rename = "socket-path")]
    pub socket_path: Option<PathBuf>,

    /// Largest accepted request line in bytes
    #[serde(rename = "max-message-size")]
    pub max_message_size: usize,

    /// Client connect/read/write timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl IpcConfig {
    /// Configured socket path, or the default under the runtime directory
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(crate::ipc::get_socket_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            max_message_size: 64 * 1024,
            timeout_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.registry.gather_timeout(), Duration::from_secs(3));
        assert_eq!(config.registry.ask_timeout(), Duration::from_secs(5));
        assert_eq!(config.registry.channel_buffer, 256);
        assert_eq!(config.registry.initial_reading, 25.0);
        assert_eq!(config.ipc.max_message_size, 65536);
        assert!(config.log_level.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml_config() {
        let yaml = r#"
log-level: debug

registry:
  gather-timeout-ms: 500
  ask-timeout-ms: 1500
  channel-buffer: 32
  initial-reading: 21.5

ipc:
  socket-path: /tmp/hd-test.sock
  max-message-size: 4096
  timeout-ms: 2000
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.registry.gather_timeout_ms, 500);
        assert_eq!(config.registry.ask_timeout_ms, 1500);
        assert_eq!(config.registry.channel_buffer, 32);
        assert_eq!(config.registry.initial_reading, 21.5);
        assert_eq!(config.ipc.socket_path(), PathBuf::from("/tmp/hd-test.sock"));
        assert_eq!(config.ipc.max_message_size, 4096);
        assert_eq!(config.ipc.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
registry:
  gather-timeout-ms: 100
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.registry.gather_timeout_ms, 100);
        assert_eq!(config.registry.ask_timeout_ms, 5000);
        assert_eq!(config.ipc.timeout_ms, 10_000);
        assert!(config.ipc.socket_path().ends_with("homedaemon/daemon.sock"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.registry.gather_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.registry.channel_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "registry:\n  initial-reading: 19.0").unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.registry.initial_reading, 19.0);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("missing.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
