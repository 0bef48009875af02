pub mod bridge;
pub mod message;
pub mod ports;
pub mod types;
