#[cfg(target_os = "linux")]
pub mod bluez;
pub mod connection;
pub mod constants;
pub mod transport;
pub mod types;
