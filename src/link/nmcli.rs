//! NetworkManager-backed provisioner.
//!
//! Joins with the credentials from the [`CredentialStore`]. Without usable
//! credentials it opens a hotspot named after the configured access point and
//! waits for the portal to write new credentials into the store.

use std::time::Duration;
use tokio::process::Command;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use super::config::LinkConfig;
use super::provisioning::{CredentialStore, Provisioner, ProvisioningError, WifiCredentials};

const HOTSPOT_CONNECTION: &str = "meteonode-provisioning";
const STORE_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct NmcliProvisioner {
    interface: String,
    store: CredentialStore,
    provisioning_timeout: Duration,
    join_timeout_secs: u64,
}

impl NmcliProvisioner {
    pub fn new(config: &LinkConfig, store: CredentialStore) -> Self {
        Self {
            interface: config.interface.clone(),
            store,
            provisioning_timeout: config.provisioning_timeout(),
            join_timeout_secs: config.join_timeout_secs,
        }
    }

    async fn nmcli(&self, action: &'static str, args: &[&str]) -> Result<String, ProvisioningError> {
        let output = Command::new("nmcli").args(args).output().await?;
        if !output.status.success() {
            return Err(ProvisioningError::Command {
                action,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn join(&self, credentials: &WifiCredentials) -> bool {
        info!("Joining wireless network {}", credentials.ssid);
        let wait = self.join_timeout_secs.to_string();
        let mut args = vec![
            "--wait",
            wait.as_str(),
            "device",
            "wifi",
            "connect",
            credentials.ssid.as_str(),
        ];
        if !credentials.psk.is_empty() {
            args.extend(["password", credentials.psk.as_str()]);
        }
        args.extend(["ifname", self.interface.as_str()]);

        match self.nmcli("join", &args).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Joining {} failed: {}", credentials.ssid, e);
                false
            }
        }
    }

    /// Opens the provisioning hotspot and waits for credentials different
    /// from `rejected` to show up in the store.
    async fn provision(
        &self,
        ap_name: &str,
        rejected: Option<&WifiCredentials>,
    ) -> Option<WifiCredentials> {
        info!("Opening provisioning access point {}", ap_name);
        let hotspot = [
            "device",
            "wifi",
            "hotspot",
            "ifname",
            self.interface.as_str(),
            "con-name",
            HOTSPOT_CONNECTION,
            "ssid",
            ap_name,
        ];
        if let Err(e) = self.nmcli("hotspot", &hotspot).await {
            error!("Could not open provisioning access point: {}", e);
            return None;
        }

        let deadline = Instant::now() + self.provisioning_timeout;
        let received = loop {
            if Instant::now() >= deadline {
                warn!(
                    "No credentials received within {:?}",
                    self.provisioning_timeout
                );
                break None;
            }
            sleep(STORE_POLL_INTERVAL).await;
            match self.store.load().await {
                Ok(Some(credentials)) if Some(&credentials) != rejected => {
                    break Some(credentials);
                }
                Ok(_) => {}
                Err(e) => debug!("Credential store not ready: {}", e),
            }
        };

        if let Err(e) = self
            .nmcli("hotspot teardown", &["connection", "down", HOTSPOT_CONNECTION])
            .await
        {
            warn!("Closing provisioning access point failed: {}", e);
        }
        received
    }
}

impl Provisioner for NmcliProvisioner {
    async fn auto_connect(&mut self, ap_name: &str) -> bool {
        let stored = match self.store.load().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Ignoring stored credentials: {}", e);
                None
            }
        };

        if let Some(credentials) = stored.as_ref() {
            if self.join(credentials).await {
                return true;
            }
        } else {
            info!("No stored wireless credentials");
        }

        match self.provision(ap_name, stored.as_ref()).await {
            Some(credentials) => self.join(&credentials).await,
            None => false,
        }
    }

    async fn reset_stored_credentials(&mut self) -> Result<(), ProvisioningError> {
        if let Ok(Some(credentials)) = self.store.load().await {
            let delete = ["connection", "delete", "id", credentials.ssid.as_str()];
            if let Err(e) = self.nmcli("forget", &delete).await {
                debug!("NetworkManager profile not removed: {}", e);
            }
        }
        self.store.erase().await
    }

    async fn link_up(&mut self) -> bool {
        match self
            .nmcli("status", &["-t", "-f", "DEVICE,STATE", "device", "status"])
            .await
        {
            Ok(output) => interface_connected(&output, &self.interface),
            Err(e) => {
                warn!("Link status query failed: {}", e);
                false
            }
        }
    }
}

/// Parses terse `nmcli -t -f DEVICE,STATE device status` output.
fn interface_connected(output: &str, interface: &str) -> bool {
    output.lines().any(|line| {
        let mut fields = line.splitn(2, ':');
        fields.next() == Some(interface) && fields.next() == Some("connected")
    })
}
