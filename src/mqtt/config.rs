use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Broker endpoint and topic configuration.
///
/// Fixed at startup and never mutated afterwards; components receive their
/// own clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub address: String,
    pub port: u16,
    pub client_id: String,
    pub publish_topic: String,
    pub subscribe_topic: String,
    /// MQTT keep-alive in seconds (rumqttc requires at least 5)
    pub keep_alive_secs: u64,
    /// Upper bound for one connection attempt including CONNACK
    pub connect_timeout_ms: u64,
    /// How long the event loop is driven per tick to deliver inbound messages
    pub service_window_ms: u64,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            address: "broker.emqx.io".to_string(),
            port: 1883,
            client_id: "mqttx_f6c62fdf".to_string(),
            publish_topic: "ynovbdxb2/meteo".to_string(),
            subscribe_topic: "ynovbdxb2/meteo".to_string(),
            keep_alive_secs: 15,
            connect_timeout_ms: 5000,
            service_window_ms: 20,
        }
    }
}

impl TopicConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn service_window(&self) -> Duration {
        Duration::from_millis(self.service_window_ms)
    }
}
