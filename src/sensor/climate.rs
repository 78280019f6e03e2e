//! Temperature/humidity reader.
//!
//! The DHT11 is driven by the kernel `dht11` IIO driver, which exposes the
//! last conversion as milli-units in sysfs. Each channel is one blocking read;
//! any failure is reported as NaN, the same way the sensor library signals an
//! invalid read.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Driver interface for a combined temperature/humidity sensor.
///
/// Both reads block for the duration of the hardware transaction and return
/// `f32::NAN` when the sensor did not deliver a valid value.
pub trait HumidityTemperatureDriver {
    fn read_temperature_c(&mut self) -> f32;
    fn read_humidity_pct(&mut self) -> f32;
}

const TEMPERATURE_FILE: &str = "in_temp_input";
const HUMIDITY_FILE: &str = "in_humidityrelative_input";

pub struct IioHumidityTemperature {
    device_dir: PathBuf,
}

impl IioHumidityTemperature {
    pub fn new(device_dir: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: device_dir.into(),
        }
    }

    fn read_milli(&self, file: &str) -> f32 {
        let path = self.device_dir.join(file);
        match read_milli_units(&path) {
            Some(value) => value,
            None => {
                debug!("IIO read of {} returned no valid value", path.display());
                f32::NAN
            }
        }
    }
}

impl HumidityTemperatureDriver for IioHumidityTemperature {
    fn read_temperature_c(&mut self) -> f32 {
        self.read_milli(TEMPERATURE_FILE)
    }

    fn read_humidity_pct(&mut self) -> f32 {
        self.read_milli(HUMIDITY_FILE)
    }
}

// The dht11 driver returns EIO on checksum or timing errors, so a failed
// read is normal and not worth more than a debug line.
fn read_milli_units(path: &Path) -> Option<f32> {
    let content = fs::read_to_string(path).ok()?;
    let milli: i32 = content.trim().parse().ok()?;
    Some(milli as f32 / 1000.0)
}
