//! SSH credential management and resolution

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use russh::keys::{PrivateKey, decode_secret_key, load_secret_key};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Key files probed under `~/.ssh` for `KeySource::Default`
const DEFAULT_KEY_FILES: [&str; 3] = ["id_ed25519", "id_ecdsa", "id_rsa"];

/// SSH credential resolution strategy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// First existing key among `~/.ssh/id_ed25519`, `id_ecdsa`, `id_rsa`
    #[default]
    Default,
    /// Explicit path to key file
    Path(PathBuf),
    /// Base64-encoded key from environment
    Env(String),
    /// Password authentication
    Password(String),
    /// Use SSH agent
    Agent,
}

impl KeySource {
    /// Resolve to credentials that can be handed to every connection
    ///
    /// Key files are loaded and decoded once here rather than per host.
    ///
    /// # Errors
    /// Returns `KeyError` if key resolution fails (env not set, invalid base64, etc.)
    pub fn resolve(&self) -> Result<ResolvedKey, KeyError> {
        match self {
            KeySource::Default => {
                let home = env::var_os("HOME").ok_or(KeyError::NoDefaultKey)?;
                let ssh_dir = PathBuf::from(home).join(".ssh");
                let path = DEFAULT_KEY_FILES
                    .iter()
                    .map(|name| ssh_dir.join(name))
                    .find(|p| p.exists())
                    .ok_or(KeyError::NoDefaultKey)?;
                load_key_file(&path)
            }
            KeySource::Path(path) => load_key_file(path),
            KeySource::Env(var_name) => {
                let base64_key =
                    env::var(var_name).map_err(|_| KeyError::EnvNotSet(var_name.clone()))?;
                let key_data = base64_decode(&base64_key).map_err(|_| KeyError::InvalidBase64)?;
                let pem = String::from_utf8(key_data).map_err(|_| KeyError::InvalidBase64)?;
                let key =
                    decode_secret_key(&pem, None).map_err(|e| KeyError::Decode(e.to_string()))?;
                debug!(var = %var_name, "decoded SSH key from environment");
                Ok(ResolvedKey::Key(Arc::new(key)))
            }
            KeySource::Password(password) => Ok(ResolvedKey::Password(password.clone())),
            KeySource::Agent => Ok(ResolvedKey::Agent),
        }
    }
}

/// Credentials ready for authentication
#[derive(Clone)]
pub enum ResolvedKey {
    /// Decoded private key
    Key(Arc<PrivateKey>),
    /// Plain password
    Password(String),
    /// Use SSH agent
    Agent,
}

impl std::fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedKey::Key(key) => f
                .debug_tuple("Key")
                .field(&key.algorithm().as_str())
                .finish(),
            ResolvedKey::Password(_) => f.write_str("Password(***)"),
            ResolvedKey::Agent => f.write_str("Agent"),
        }
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("key file not found: {0}")]
    NotFound(String),

    #[error("no key found in ~/.ssh (tried id_ed25519, id_ecdsa, id_rsa)")]
    NoDefaultKey,

    #[error("cannot decode key: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn load_key_file(path: &Path) -> Result<ResolvedKey, KeyError> {
    if !path.exists() {
        return Err(KeyError::NotFound(path.display().to_string()));
    }
    validate_key_permissions(path)?;

    let key = load_secret_key(path, None).map_err(|e| KeyError::Decode(e.to_string()))?;
    debug!(path = %path.display(), "loaded SSH key");

    Ok(ResolvedKey::Key(Arc::new(key)))
}

fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

#[cfg(unix)]
fn validate_key_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode();

    // group/other bits must be clear
    if mode & 0o77 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_key_permissions(_path: &Path) -> Result<(), KeyError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_file() {
        let source = KeySource::Path(PathBuf::from("/nonexistent/id_ed25519"));
        assert!(matches!(source.resolve(), Err(KeyError::NotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_open_permissions_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_rsa");
        std::fs::write(&path, "not a key").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let source = KeySource::Path(path);
        assert!(matches!(source.resolve(), Err(KeyError::BadPermissions(_))));
    }

    #[test]
    fn test_agent_needs_no_local_key() {
        assert!(matches!(KeySource::Agent.resolve(), Ok(ResolvedKey::Agent)));
    }

    #[test]
    fn test_env_not_set() {
        let source = KeySource::Env("HOSTPUSH_TEST_KEY_THAT_IS_NOT_SET".to_string());
        assert!(matches!(source.resolve(), Err(KeyError::EnvNotSet(_))));
    }

    #[test]
    fn test_password_is_not_printed() {
        let resolved = KeySource::Password("hunter2".to_string()).resolve().unwrap();
        assert_eq!(format!("{resolved:?}"), "Password(***)");
    }
}
