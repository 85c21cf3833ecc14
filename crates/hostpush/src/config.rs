//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use hostpush_core::TaskConfig;
use hostpush_exec::{ConnectionParams, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, KeySource};
use serde::{Deserialize, Serialize};

/// Top-level configuration for hostpush
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Login settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Per-host connection settings
    #[serde(default)]
    pub hosts: HostsConfig,
    /// Task execution settings
    #[serde(default)]
    pub run: RunConfig,
    /// Timeouts in seconds
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
    /// Report settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Login settings
///
/// Tried in order: password, key from environment, identity file, agent,
/// then the usual keys in `~/.ssh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// SSH user (defaults to root)
    #[serde(default = "default_user")]
    pub user: String,
    /// Password for password authentication
    pub password: Option<String>,
    /// Path to SSH private key
    pub identity_file: Option<String>,
    /// Environment variable holding a base64 private key
    pub key_env: Option<String>,
    /// Authenticate through ssh-agent
    #[serde(default)]
    pub agent: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            password: None,
            identity_file: None,
            key_env: None,
            agent: false,
        }
    }
}

fn default_user() -> String {
    "root".to_string()
}

/// Per-host connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsConfig {
    /// SSH port when a host does not name one
    #[serde(default = "default_port")]
    pub port: u16,
    /// Verify server keys against known_hosts
    #[serde(default)]
    pub strict_host_key_checking: bool,
    /// Serve localhost from the local filesystem instead of SSH
    #[serde(default)]
    pub local: bool,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            strict_host_key_checking: false,
            local: false,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Task execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Hosts handled at the same time
    pub concurrency: Option<usize>,
    /// Extra attempts after a retryable connection failure
    #[serde(default)]
    pub connect_retries: u32,
    /// Delay between connection attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            connect_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_retry_delay_ms() -> u64 {
    500
}

/// Timeouts in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connect + authenticate
    #[serde(default = "default_conn_timeout")]
    pub conn: u64,
    /// Single file upload
    pub transfer: Option<u64>,
    /// Whole task
    pub task: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            conn: default_conn_timeout(),
            transfer: None,
            task: None,
        }
    }
}

fn default_conn_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_secs()
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit logs as JSON lines
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Report settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Print the report as JSON
    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("cannot read config {}: {e}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Load from an explicit path, then default paths, else use defaults
    pub fn load_default(explicit: Option<&Path>) -> eyre::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        // Check environment variable
        if let Ok(path) = std::env::var("HOSTPUSH_CONFIG") {
            return Self::load(&PathBuf::from(path));
        }

        // Try common paths
        let mut paths = vec![
            PathBuf::from("hostpush.toml"),
            PathBuf::from("/etc/hostpush/hostpush.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("hostpush/hostpush.toml"));
        }

        for path in paths {
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Config::default())
    }

    /// Credentials strategy from `[auth]`
    #[must_use]
    pub fn key_source(&self) -> KeySource {
        let auth = &self.auth;

        if let Some(password) = &auth.password {
            KeySource::Password(password.clone())
        } else if let Some(var) = &auth.key_env {
            KeySource::Env(var.clone())
        } else if let Some(path) = &auth.identity_file {
            KeySource::Path(expand_home(path))
        } else if auth.agent {
            KeySource::Agent
        } else {
            KeySource::Default
        }
    }

    /// Connection parameters shared by every host
    #[must_use]
    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams::new(&self.auth.user)
            .with_port(self.hosts.port)
            .with_auth(self.key_source())
            .with_connect_timeout(Duration::from_secs(self.timeout.conn))
            .with_strict_host_key_checking(self.hosts.strict_host_key_checking)
    }

    /// Task execution settings
    #[must_use]
    pub fn task_config(&self) -> TaskConfig {
        TaskConfig {
            concurrency: self.run.concurrency,
            connect_retries: self.run.connect_retries,
            retry_delay_ms: self.run.retry_delay_ms,
            transfer_timeout_secs: self.timeout.transfer,
            task_timeout_secs: self.timeout.task,
            ..TaskConfig::default()
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
