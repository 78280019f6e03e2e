//! Sensor acquisition
//!
//! ```text
//! sensor/
//! ├── reading.rs  - SensorReading, channel set, SensorPort trait
//! ├── climate.rs  - temperature/humidity driver interface (IIO adapter)
//! ├── light.rs    - SPI light sensor with scoped chip-select
//! └── source.rs   - SensorSource combining both readers
//! ```

pub mod climate;
pub mod light;
pub mod reading;
pub mod source;

pub use reading::{Channel, ChannelSet, LightSample, SensorPort, SensorReading};
pub use source::SensorSource;
