use tracing::{debug, warn};

use super::climate::HumidityTemperatureDriver;
use super::light::LightReader;
use super::reading::{Channel, ChannelSet, SensorPort, SensorReading};

/// Polls the climate driver and the optional light sensor for one reading.
///
/// Only active channels are read. A NaN from the climate driver becomes an
/// absent channel; the publisher decides what to do with it.
pub struct SensorSource {
    climate: Box<dyn HumidityTemperatureDriver>,
    light: Option<Box<dyn LightReader>>,
    channels: ChannelSet,
}

impl SensorSource {
    pub fn new(
        climate: Box<dyn HumidityTemperatureDriver>,
        light: Option<Box<dyn LightReader>>,
        channels: ChannelSet,
    ) -> Self {
        if channels.contains(Channel::Light) && light.is_none() {
            warn!("Light channel is active but no light sensor is attached; every cycle will be dropped");
        }
        Self {
            climate,
            light,
            channels,
        }
    }
}

fn valid(value: f32) -> Option<f32> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

impl SensorPort for SensorSource {
    fn read(&mut self) -> SensorReading {
        let mut reading = SensorReading::default();

        if self.channels.contains(Channel::Temperature) {
            reading.temperature_c = valid(self.climate.read_temperature_c());
        }
        if self.channels.contains(Channel::Humidity) {
            reading.humidity_pct = valid(self.climate.read_humidity_pct());
        }
        if self.channels.contains(Channel::Light) {
            reading.light = self.light.as_mut().and_then(|light| light.read_light());
        }

        debug!("Sensor reading: {:?}", reading);
        reading
    }
}
