//! Connector factory: picks SSH or local connections per host

use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use hostpush_exec::{
    Connection, ConnectionError, ConnectionParams, Connector, HostAddr, LocalConnector,
    SshConnector,
};

use crate::config::Config;

/// Routes local hosts to `LocalConnector` and everything else to SSH
pub struct DefaultConnector {
    ssh: Option<SshConnector>,
    local: Option<LocalConnector>,
    params: ConnectionParams,
}

impl DefaultConnector {
    /// Build the connector needed for `hosts`
    ///
    /// SSH credentials are only resolved when some host actually needs SSH.
    ///
    /// # Errors
    /// Returns error if SSH credentials cannot be resolved
    pub fn new(config: &Config, hosts: &[String]) -> Result<Self> {
        let params = config.connection_params();
        let local = config.hosts.local.then(LocalConnector::new);

        let needs_ssh = local.is_none() || hosts.iter().any(|h| !is_local_host(h, &params));
        let ssh = if needs_ssh {
            let connector = SshConnector::new(params.clone())
                .map_err(|e| eyre::eyre!("failed to load SSH credentials: {e}"))?;
            Some(connector)
        } else {
            None
        };

        Ok(Self { ssh, local, params })
    }

    /// Shared handle for a task
    pub fn into_shared(self) -> Arc<dyn Connector> {
        Arc::new(self)
    }
}

#[async_trait]
impl Connector for DefaultConnector {
    async fn connect(&self, host: &str) -> Result<Box<dyn Connection>, ConnectionError> {
        if let Some(local) = &self.local
            && is_local_host(host, &self.params)
        {
            return local.connect(host).await;
        }

        match &self.ssh {
            Some(ssh) => ssh.connect(host).await,
            None => Err(ConnectionError::new(
                host,
                hostpush_exec::ConnectCause::ConfigError("no SSH connector configured".into()),
            )),
        }
    }

    fn connector_type(&self) -> &'static str {
        match (&self.ssh, &self.local) {
            (Some(_), Some(_)) => "ssh+local",
            (Some(_), None) => "ssh",
            _ => "local",
        }
    }
}

/// Whether `host` names the local machine
///
/// Only a bare name or loopback address with the default user counts; an
/// explicit `user@` or port means the caller wants a real SSH session.
#[must_use]
pub fn is_local_host(host: &str, params: &ConnectionParams) -> bool {
    if host.contains('@') {
        return false;
    }
    match HostAddr::parse(host, params) {
        Ok(addr) => {
            addr.port == params.port
                && matches!(addr.host.as_str(), "localhost" | "127.0.0.1" | "::1")
        }
        Err(_) => false,
    }
}
