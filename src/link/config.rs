use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// SSID of the provisioning access point opened when no usable
    /// credentials are stored
    pub ap_name: String,
    /// Wireless interface handed to NetworkManager
    pub interface: String,
    /// BCM number of the "erase credentials" input (active low)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_pin: Option<u8>,
    /// How long provisioning waits for credentials before giving up
    pub provisioning_timeout_secs: u64,
    /// Per-join timeout passed to `nmcli --wait`
    pub join_timeout_secs: u64,
    /// Minimum spacing of link checks while connected; 0 checks every tick
    pub check_interval_ms: u64,
    /// Credential store location; defaults next to the node configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ap_name: "MeteoNode_ConfigPortal".to_string(),
            interface: "wlan0".to_string(),
            reset_pin: Some(17),
            provisioning_timeout_secs: 180,
            join_timeout_secs: 30,
            check_interval_ms: 2000,
            credentials_path: None,
        }
    }
}

impl LinkConfig {
    pub fn provisioning_timeout(&self) -> Duration {
        Duration::from_secs(self.provisioning_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}
