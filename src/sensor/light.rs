//! SPI light sensor
//!
//! The sensor is a 2-byte read-only SPI device behind a dedicated chip-select
//! line. The bus has no other users, so the only synchronization needed is
//! strict sequencing: assert CS, clock two bytes, release CS. The release is
//! tied to a guard so it also happens when a transfer fails halfway.

use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::{debug, warn};

use super::reading::LightSample;

/// Factor from raw intensity to lux used by the reference board.
pub const DEFAULT_LUX_FACTOR: f32 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("SPI transfer failed: {0}")]
    Transfer(String),

    #[error("SPI transfer returned {0} bytes")]
    ShortTransfer(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("SPI error: {0}")]
    Spi(#[from] rppal::spi::Error),
}

/// Synchronous full-duplex byte transfer.
pub trait SerialBus {
    fn transfer_byte(&mut self, out: u8) -> Result<u8, BusError>;
}

/// Chip-select line of one peripheral (active low on the reference board).
pub trait ChipSelect {
    fn assert(&mut self);
    fn deassert(&mut self);
}

/// Holds chip-select asserted for its lifetime.
pub struct SelectGuard<'a, C: ChipSelect> {
    cs: &'a mut C,
}

impl<'a, C: ChipSelect> SelectGuard<'a, C> {
    pub fn acquire(cs: &'a mut C) -> Self {
        cs.assert();
        Self { cs }
    }
}

impl<C: ChipSelect> Drop for SelectGuard<'_, C> {
    fn drop(&mut self) {
        self.cs.deassert();
    }
}

/// Combines the two received bytes into the raw intensity value.
pub fn assemble_raw(bytes: [u8; 2]) -> u16 {
    ((bytes[0] as u16) << 3) | ((bytes[1] as u16) >> 4)
}

pub struct LightSensor<B: SerialBus, C: ChipSelect> {
    bus: B,
    cs: C,
    lux_factor: f32,
}

impl<B: SerialBus, C: ChipSelect> LightSensor<B, C> {
    pub fn new(bus: B, mut cs: C, lux_factor: f32) -> Self {
        // idle state of the line is released
        cs.deassert();
        Self { bus, cs, lux_factor }
    }

    /// Performs one two-byte transfer. No retries at this layer.
    pub fn read(&mut self) -> Result<LightSample, BusError> {
        let bytes = {
            let _selected = SelectGuard::acquire(&mut self.cs);
            let first = self.bus.transfer_byte(0x00)?;
            let second = self.bus.transfer_byte(0x00)?;
            [first, second]
        };

        let raw = assemble_raw(bytes);
        let sample = LightSample {
            raw,
            lux: raw as f32 * self.lux_factor,
        };
        debug!(
            "Light transfer {:02X?} -> raw={} lux={:.1}",
            bytes, sample.raw, sample.lux
        );
        Ok(sample)
    }
}

/// Object-safe view of a light sensor, so the sensor source does not have to
/// carry the bus and chip-select types.
pub trait LightReader {
    fn read_light(&mut self) -> Option<LightSample>;
}

impl<B: SerialBus, C: ChipSelect> LightReader for LightSensor<B, C> {
    fn read_light(&mut self) -> Option<LightSample> {
        match self.read() {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!("Light sensor read failed: {}", e);
                None
            }
        }
    }
}

// ----------------------------------------------------------------------------
// rppal adapters
// ----------------------------------------------------------------------------

pub struct RppalSpiBus {
    spi: Spi,
}

impl RppalSpiBus {
    /// Opens the SPI bus in mode 0. The hardware slave-select is left to the
    /// kernel; the sensor itself is addressed through [`GpioChipSelect`].
    pub fn open(bus: u8, clock_hz: u32) -> Result<Self, HardwareError> {
        let bus = match bus {
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            _ => Bus::Spi0,
        };
        let spi = Spi::new(bus, SlaveSelect::Ss0, clock_hz, Mode::Mode0)?;
        Ok(Self { spi })
    }
}

impl SerialBus for RppalSpiBus {
    fn transfer_byte(&mut self, out: u8) -> Result<u8, BusError> {
        let mut read = [0u8; 1];
        let count = self
            .spi
            .transfer(&mut read, &[out])
            .map_err(|e| BusError::Transfer(e.to_string()))?;
        if count != 1 {
            return Err(BusError::ShortTransfer(count));
        }
        Ok(read[0])
    }
}

pub struct GpioChipSelect {
    pin: OutputPin,
}

impl GpioChipSelect {
    pub fn open(bcm_pin: u8) -> Result<Self, HardwareError> {
        let pin = Gpio::new()?.get(bcm_pin)?.into_output_high();
        Ok(Self { pin })
    }
}

impl ChipSelect for GpioChipSelect {
    fn assert(&mut self) {
        self.pin.set_low();
    }

    fn deassert(&mut self) {
        self.pin.set_high();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum BusEvent {
        Assert,
        Deassert,
        Transfer(u8),
    }

    type Log = Rc<RefCell<Vec<BusEvent>>>;

    struct ScriptedBus {
        replies: Vec<Result<u8, ()>>,
        log: Log,
    }

    impl SerialBus for ScriptedBus {
        fn transfer_byte(&mut self, out: u8) -> Result<u8, BusError> {
            self.log.borrow_mut().push(BusEvent::Transfer(out));
            match self.replies.remove(0) {
                Ok(byte) => Ok(byte),
                Err(()) => Err(BusError::Transfer("scripted failure".into())),
            }
        }
    }

    struct RecordingSelect {
        log: Log,
    }

    impl ChipSelect for RecordingSelect {
        fn assert(&mut self) {
            self.log.borrow_mut().push(BusEvent::Assert);
        }

        fn deassert(&mut self) {
            self.log.borrow_mut().push(BusEvent::Deassert);
        }
    }

    fn sensor(replies: Vec<Result<u8, ()>>) -> (LightSensor<ScriptedBus, RecordingSelect>, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sensor = LightSensor::new(
            ScriptedBus {
                replies,
                log: log.clone(),
            },
            RecordingSelect { log: log.clone() },
            DEFAULT_LUX_FACTOR,
        );
        log.borrow_mut().clear();
        (sensor, log)
    }

    #[test]
    fn raw_value_uses_high_byte_shift_and_low_nibble() {
        assert_eq!(assemble_raw([0x9A, 0x00]), 1232);
        // 0x30 >> 4 contributes the low bits
        assert_eq!(assemble_raw([0x9A, 0x30]), 1235);
        assert_eq!(assemble_raw([0xFF, 0xFF]), 2047);
    }

    #[test]
    fn read_converts_to_lux_and_releases_chip_select() {
        let (mut sensor, log) = sensor(vec![Ok(0x9A), Ok(0x00)]);
        let sample = sensor.read().unwrap();

        assert_eq!(sample.raw, 1232);
        assert_eq!(sample.lux, 616.0);
        assert_eq!(
            *log.borrow(),
            vec![
                BusEvent::Assert,
                BusEvent::Transfer(0x00),
                BusEvent::Transfer(0x00),
                BusEvent::Deassert,
            ]
        );
    }

    #[test]
    fn chip_select_is_released_when_transfer_fails() {
        let (mut sensor, log) = sensor(vec![Ok(0x9A), Err(())]);
        assert!(sensor.read().is_err());
        assert_eq!(log.borrow().last(), Some(&BusEvent::Deassert));
        assert_eq!(
            log.borrow()
                .iter()
                .filter(|event| **event == BusEvent::Assert)
                .count(),
            1
        );
    }

    #[test]
    fn failed_read_is_reported_as_absent() {
        let (mut sensor, _log) = sensor(vec![Err(())]);
        assert_eq!(sensor.read_light(), None);
    }
}
