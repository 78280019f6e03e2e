//! Wire payload
//!
//! Downstream consumers parse the payload as a flat JSON object with a fixed
//! field order and two decimals for the climate values, e.g.
//! `{"temperature": 23.40, "humidity": 55.10, "light": 612}`. The exact text
//! is produced by hand because the separator spacing is part of the format.

use crate::sensor::{Channel, ChannelSet, SensorReading};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("{0} channel returned no valid value")]
    MissingChannel(Channel),
}

/// A reading that passed validation for the active channel set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryPayload {
    temperature_c: Option<f32>,
    humidity_pct: Option<f32>,
    light_raw: Option<u16>,
}

impl TelemetryPayload {
    /// Builds the payload, refusing any reading with an absent active
    /// channel. Partial payloads are never produced.
    pub fn from_reading(
        reading: &SensorReading,
        channels: &ChannelSet,
    ) -> Result<Self, PayloadError> {
        if let Some(channel) = reading.missing_channel(channels) {
            return Err(PayloadError::MissingChannel(channel));
        }
        Ok(Self {
            temperature_c: reading
                .temperature_c
                .filter(|_| channels.contains(Channel::Temperature)),
            humidity_pct: reading
                .humidity_pct
                .filter(|_| channels.contains(Channel::Humidity)),
            light_raw: reading
                .light
                .filter(|_| channels.contains(Channel::Light))
                .map(|light| light.raw),
        })
    }

    pub fn to_wire(&self) -> String {
        let mut fields: Vec<String> = Vec::with_capacity(3);
        if let Some(temperature) = self.temperature_c {
            fields.push(format!("\"temperature\": {:.2}", temperature));
        }
        if let Some(humidity) = self.humidity_pct {
            fields.push(format!("\"humidity\": {:.2}", humidity));
        }
        if let Some(light) = self.light_raw {
            fields.push(format!("\"light\": {}", light));
        }

        format!("{{{}}}", fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::LightSample;

    fn reading(light: Option<u16>) -> SensorReading {
        SensorReading {
            temperature_c: Some(23.4),
            humidity_pct: Some(55.1),
            light: light.map(|raw| LightSample {
                raw,
                lux: raw as f32 * 0.5,
            }),
        }
    }

    #[test]
    fn serializes_all_channels_in_fixed_order() {
        let payload = TelemetryPayload::from_reading(&reading(Some(612)), &ChannelSet::ALL).unwrap();
        assert_eq!(
            payload.to_wire(),
            r#"{"temperature": 23.40, "humidity": 55.10, "light": 612}"#
        );
    }

    #[test]
    fn light_field_omitted_without_light_channel() {
        let payload =
            TelemetryPayload::from_reading(&reading(None), &ChannelSet::CLIMATE_ONLY).unwrap();
        assert_eq!(payload.to_wire(), r#"{"temperature": 23.40, "humidity": 55.10}"#);

        // a light value read anyway is not leaked into a climate-only payload
        let payload =
            TelemetryPayload::from_reading(&reading(Some(5)), &ChannelSet::CLIMATE_ONLY).unwrap();
        assert_eq!(payload.to_wire(), r#"{"temperature": 23.40, "humidity": 55.10}"#);
    }

    #[test]
    fn absent_active_channel_is_refused() {
        let mut nan_temperature = reading(Some(612));
        nan_temperature.temperature_c = None;
        assert_eq!(
            TelemetryPayload::from_reading(&nan_temperature, &ChannelSet::ALL),
            Err(PayloadError::MissingChannel(Channel::Temperature))
        );
        assert_eq!(
            TelemetryPayload::from_reading(&reading(None), &ChannelSet::ALL),
            Err(PayloadError::MissingChannel(Channel::Light))
        );
    }

    #[test]
    fn rounds_to_two_decimals() {
        let sample = SensorReading {
            temperature_c: Some(-3.456),
            humidity_pct: Some(100.0),
            light: None,
        };
        let payload = TelemetryPayload::from_reading(&sample, &ChannelSet::CLIMATE_ONLY).unwrap();
        assert_eq!(payload.to_wire(), r#"{"temperature": -3.46, "humidity": 100.00}"#);
    }
}
