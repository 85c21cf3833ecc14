//! Connection parameters and host address parsing

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConnectCause;
use crate::keys::KeySource;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Default connect + authenticate timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings shared by every host of a task
///
/// Resolved once from configuration and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Login user
    pub user: String,
    /// Port (default 22)
    #[serde(default = "default_port")]
    pub port: u16,
    /// How to authenticate
    #[serde(default)]
    pub auth: KeySource,
    /// Timeout for connect + authenticate + subsystem start
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Verify server keys against `~/.ssh/known_hosts`
    #[serde(default)]
    pub strict_host_key_checking: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

impl ConnectionParams {
    /// Create params for `user` with defaults for everything else
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            port: DEFAULT_PORT,
            auth: KeySource::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            strict_host_key_checking: false,
        }
    }

    /// Set authentication source
    #[must_use]
    pub fn with_auth(mut self, auth: KeySource) -> Self {
        self.auth = auth;
        self
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable known_hosts verification
    #[must_use]
    pub fn with_strict_host_key_checking(mut self, strict: bool) -> Self {
        self.strict_host_key_checking = strict;
        self
    }
}

/// Network address of one host, after applying per-host overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddr {
    /// Hostname or IP address
    pub host: String,
    /// Port
    pub port: u16,
    /// Login user
    pub user: String,
}

impl HostAddr {
    /// Parse `[user@]host[:port]`, filling gaps from `params`
    ///
    /// IPv6 literals need brackets when a port is given (`[::1]:2222`).
    ///
    /// # Errors
    /// Returns `ConnectCause::ConfigError` for an empty host, user or invalid port
    pub fn parse(id: &str, params: &ConnectionParams) -> Result<Self, ConnectCause> {
        let (user, rest) = match id.rsplit_once('@') {
            Some(("", _)) => {
                return Err(ConnectCause::ConfigError(format!("empty user in '{id}'")));
            }
            Some((user, rest)) => (user.to_string(), rest),
            None => (params.user.clone(), id),
        };

        let (host, port) = if let Some(stripped) = rest.strip_prefix('[') {
            let (host, tail) = stripped
                .split_once(']')
                .ok_or_else(|| ConnectCause::ConfigError(format!("unclosed '[' in '{id}'")))?;
            let port = match tail.strip_prefix(':') {
                Some(p) => parse_port(p, id)?,
                None if tail.is_empty() => params.port,
                None => {
                    return Err(ConnectCause::ConfigError(format!(
                        "unexpected '{tail}' in '{id}'"
                    )));
                }
            };
            (host, port)
        } else if rest.matches(':').count() == 1 {
            let (host, port) = rest.split_once(':').unwrap_or((rest, ""));
            (host, parse_port(port, id)?)
        } else {
            (rest, params.port)
        };

        if host.is_empty() {
            return Err(ConnectCause::ConfigError(format!("empty host in '{id}'")));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            user,
        })
    }
}

fn parse_port(port: &str, id: &str) -> Result<u16, ConnectCause> {
    port.parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ConnectCause::ConfigError(format!("invalid port '{port}' in '{id}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParams {
        ConnectionParams::new("deploy").with_port(2200)
    }

    #[test]
    fn test_plain_host_uses_defaults() {
        let addr = HostAddr::parse("web1", &params()).unwrap();
        assert_eq!(addr.host, "web1");
        assert_eq!(addr.port, 2200);
        assert_eq!(addr.user, "deploy");
    }

    #[test]
    fn test_user_and_port_override() {
        let addr = HostAddr::parse("root@10.0.0.5:22", &params()).unwrap();
        assert_eq!(addr.host, "10.0.0.5");
        assert_eq!(addr.port, 22);
        assert_eq!(addr.user, "root");
    }

    #[test]
    fn test_ipv6_literals() {
        let bare = HostAddr::parse("fe80::1", &params()).unwrap();
        assert_eq!(bare.host, "fe80::1");
        assert_eq!(bare.port, 2200);

        let bracketed = HostAddr::parse("[::1]:2222", &params()).unwrap();
        assert_eq!(bracketed.host, "::1");
        assert_eq!(bracketed.port, 2222);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(HostAddr::parse("", &params()).is_err());
        assert!(HostAddr::parse("@web1", &params()).is_err());
        assert!(HostAddr::parse("web1:ssh", &params()).is_err());
        assert!(HostAddr::parse("web1:0", &params()).is_err());
        assert!(HostAddr::parse("[::1", &params()).is_err());
    }
}
