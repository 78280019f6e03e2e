use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::sensor::{Channel, ChannelSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Interval between publish cycles
    pub period_ms: u64,
    /// Channels sampled and required for every cycle, in any order
    pub channels: Vec<Channel>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            period_ms: 10_000,
            channels: vec![Channel::Temperature, Channel::Humidity, Channel::Light],
        }
    }
}

impl TelemetryConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn channel_set(&self) -> ChannelSet {
        ChannelSet::from_channels(&self.channels)
    }
}
