//! Wireless provisioning collaborators consumed by the link manager.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("nmcli {action} failed: {stderr}")]
    Command { action: &'static str, stderr: String },

    #[error("Credential store is invalid: {0}")]
    InvalidCredentials(String),
}

/// Connects the node to a wireless network, provisioning credentials when
/// none are usable.
#[allow(async_fn_in_trait)]
pub trait Provisioner {
    /// Joins the network with stored credentials; when there are none or
    /// they are rejected, opens an access point named `ap_name` and blocks
    /// until credentials arrive out of band. Returns `false` if no link could
    /// be established.
    async fn auto_connect(&mut self, ap_name: &str) -> bool;

    async fn reset_stored_credentials(&mut self) -> Result<(), ProvisioningError>;

    async fn link_up(&mut self) -> bool;
}

/// Digital input requesting a credential erase. Sampled once at boot.
pub trait ResetInput {
    fn is_asserted(&mut self) -> bool;
}

impl<R: ResetInput + ?Sized> ResetInput for Box<R> {
    fn is_asserted(&mut self) -> bool {
        (**self).is_asserted()
    }
}

/// Stand-in for boards without a reset input wired.
#[derive(Debug, Default)]
pub struct NoResetInput;

impl ResetInput for NoResetInput {
    fn is_asserted(&mut self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: String,
    #[serde(default)]
    pub psk: String,
}

/// TOML file holding the credentials of the network to join.
///
/// Written by the provisioning portal, read by the node, erased on a reset
/// request.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<WifiCredentials>, ProvisioningError> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        let credentials: WifiCredentials = toml::from_str(&content)
            .map_err(|e| ProvisioningError::InvalidCredentials(e.to_string()))?;
        if credentials.ssid.is_empty() {
            return Err(ProvisioningError::InvalidCredentials(
                "ssid is empty".to_string(),
            ));
        }
        Ok(Some(credentials))
    }

    pub async fn save(&self, credentials: &WifiCredentials) -> Result<(), ProvisioningError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(credentials)
            .map_err(|e| ProvisioningError::InvalidCredentials(e.to_string()))?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    pub async fn erase(&self) -> Result<(), ProvisioningError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored credentials at {}", self.path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(name: &str) -> CredentialStore {
        CredentialStore::new(std::env::temp_dir().join(format!(
            "meteonode-creds-{}-{}/wifi.toml",
            name,
            std::process::id()
        )))
    }

    #[tokio::test]
    async fn save_load_erase_cycle() {
        let store = store("cycle");
        assert_eq!(store.load().await.unwrap(), None);

        let credentials = WifiCredentials {
            ssid: "meteo-lab".to_string(),
            psk: "hunter22".to_string(),
        };
        store.save(&credentials).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(credentials));

        store.erase().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        // erasing twice is not an error
        store.erase().await.unwrap();
    }

    #[tokio::test]
    async fn empty_ssid_is_rejected() {
        let store = store("empty");
        tokio::fs::create_dir_all(store.path().parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(store.path(), "ssid = \"\"\n").await.unwrap();
        assert!(matches!(
            store.load().await,
            Err(ProvisioningError::InvalidCredentials(_))
        ));
        store.erase().await.unwrap();
    }
}
