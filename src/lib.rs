// lib.rs

pub use one_wire_bus::Address;

mod config;
pub use config::*;

mod indicator;
pub use indicator::*;

mod bus;
pub use bus::*;

mod topics;
pub use topics::*;

mod wifi;
pub use wifi::*;

mod mqtt;
pub use mqtt::*;

mod publish;
pub use publish::*;

mod supervisor;
pub use supervisor::*;

#[cfg(target_os = "espidf")]
pub mod esp;

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");

// EOF
