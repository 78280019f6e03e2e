//! Wireless link lifecycle
//!
//! ```text
//! link/
//! ├── config.rs        - LinkConfig (AP name, interface, reset pin)
//! ├── provisioning.rs  - Provisioner/ResetInput traits, credential store
//! ├── nmcli.rs         - NetworkManager provisioner
//! ├── reset_pin.rs     - GPIO reset input
//! └── link_manager.rs  - LinkManager state machine
//! ```

pub mod config;
pub mod link_manager;
pub mod nmcli;
pub mod provisioning;
pub mod reset_pin;

pub use config::LinkConfig;
pub use link_manager::{LinkError, LinkManager, LinkState};
pub use nmcli::NmcliProvisioner;
pub use provisioning::{CredentialStore, NoResetInput, Provisioner, ResetInput};
pub use reset_pin::GpioResetInput;
