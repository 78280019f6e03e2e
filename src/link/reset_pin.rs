use rppal::gpio::{Gpio, InputPin};

use super::provisioning::ResetInput;

/// Push button pulling a GPIO line low to request a credential erase.
pub struct GpioResetInput {
    pin: InputPin,
}

impl GpioResetInput {
    pub fn open(bcm_pin: u8) -> Result<Self, rppal::gpio::Error> {
        let pin = Gpio::new()?.get(bcm_pin)?.into_input_pullup();
        Ok(Self { pin })
    }
}

impl ResetInput for GpioResetInput {
    fn is_asserted(&mut self) -> bool {
        self.pin.is_low()
    }
}
