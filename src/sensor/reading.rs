//! Sensor reading entity and the channel set a node is configured with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One telemetry channel the node can sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Temperature,
    Humidity,
    Light,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::Light => "light",
        };
        write!(f, "{}", name)
    }
}

/// Set of active channels.
///
/// Replaces the two hard-wired loop variants (with and without the light
/// sensor): every active channel is required for a cycle to be published,
/// inactive channels are never read and never appear in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSet {
    temperature: bool,
    humidity: bool,
    light: bool,
}

impl ChannelSet {
    pub const ALL: ChannelSet = ChannelSet {
        temperature: true,
        humidity: true,
        light: true,
    };

    pub const CLIMATE_ONLY: ChannelSet = ChannelSet {
        temperature: true,
        humidity: true,
        light: false,
    };

    pub fn from_channels(channels: &[Channel]) -> Self {
        let mut set = ChannelSet {
            temperature: false,
            humidity: false,
            light: false,
        };
        for channel in channels {
            match channel {
                Channel::Temperature => set.temperature = true,
                Channel::Humidity => set.humidity = true,
                Channel::Light => set.light = true,
            }
        }
        set
    }

    pub fn contains(&self, channel: Channel) -> bool {
        match channel {
            Channel::Temperature => self.temperature,
            Channel::Humidity => self.humidity,
            Channel::Light => self.light,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.temperature || self.humidity || self.light)
    }

    /// Active channels in wire order.
    pub fn iter(&self) -> impl Iterator<Item = Channel> + '_ {
        [Channel::Temperature, Channel::Humidity, Channel::Light]
            .into_iter()
            .filter(|channel| self.contains(*channel))
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        ChannelSet::ALL
    }
}

/// Light sample as read from the SPI light sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    /// Raw intensity assembled from the two transferred bytes
    pub raw: u16,
    /// Illuminance derived from `raw` with the configured conversion factor
    pub lux: f32,
}

/// A single sampling of all channels.
///
/// Produced fresh for every publish cycle. A channel is `None` when its
/// driver reported an invalid read or when the channel is not active.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub light: Option<LightSample>,
}

impl SensorReading {
    pub fn has(&self, channel: Channel) -> bool {
        match channel {
            Channel::Temperature => self.temperature_c.is_some(),
            Channel::Humidity => self.humidity_pct.is_some(),
            Channel::Light => self.light.is_some(),
        }
    }

    /// First active channel that has no value, if any.
    pub fn missing_channel(&self, channels: &ChannelSet) -> Option<Channel> {
        channels.iter().find(|channel| !self.has(*channel))
    }
}

/// Source of fresh sensor readings, consumed by the telemetry publisher.
pub trait SensorPort {
    fn read(&mut self) -> SensorReading;
}
