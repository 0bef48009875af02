use std::any::Any;
use std::io;
use thiserror::Error;
use msgbox::IconType;
use std::fmt::{Debug, Display};
use std::str::Utf8Error;
use iced;
use serde_json;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (iced): {source}")]
    Iced { #[from] source: iced::Error },

    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to list cameras: {source}")]
    VisionError { #[from] source: VisionError },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[cfg(target_os = "linux")]
    #[error("Error communicating with device (bluez): {source}")]
    Bluez { #[from] source: bluer::Error },

    #[error("Error reading/writing the serial link: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Invalid bluetooth address: {0}")]
    InvalidAddress(String),

    #[error("The device does not offer a serial port service")]
    MissingSerialService,

    #[error("Bluetooth discovery is not supported on this platform, configure a serial path instead")]
    Unsupported,
}

#[derive(Error, Debug)]
pub enum MidiError {
    #[error("Failed to initialize MIDI (midir): {source}")]
    Init { #[from] source: midir::InitError },

    #[error("Failed to open virtual MIDI port: {0}")]
    Connect(String),

    #[error("Failed to send MIDI message: {source}")]
    Send { #[from] source: midir::SendError },

    #[error("Virtual MIDI ports are not supported on this platform")]
    VirtualPortsUnsupported,

    #[error("The MIDI port thread stopped unexpectedly")]
    ThreadStopped,
}

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Camera error (nokhwa): {source}")]
    Camera { #[from] source: nokhwa::NokhwaError },

    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Inference error (ort): {source}")]
    Ort { #[from] source: ort::Error },

    #[error("Inference failed: {0}")]
    InferenceFailed(String),
}

pub fn readable_thread_panic_error(error: &Box<dyn Any + Send + 'static>) -> String {
    let mut stringified = String::from("???");

    if let Some(s) = error.downcast_ref::<&str>() {
        stringified = format!("{}", s);
    }
    else if let Some(s) = error.downcast_ref::<String>() {
        stringified = format!("{}", s);
    }
    let type_id = (**error).type_id();

    format!("panic from thread: [{:?}]: [{}]", type_id, stringified)
}

pub fn error_msgbox<T: Display>(message: &'static str, error: &T) {
    let message = format!("{}: {}", message, error);
    eprintln!("{}", &message);
    if let Err(err) = msgbox::create(concat!("El Poisson Billy ", env!("CARGO_PKG_VERSION")), &message, IconType::Error) {
        eprintln!("Failed to create msgbox: {:?}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn panic_payload_is_readable() {
        let result = panic::catch_unwind(|| {
            panic!("camera exploded");
        });
        let error = result.unwrap_err();

        assert!(readable_thread_panic_error(&error).ends_with("[camera exploded]"));
    }

    #[test]
    fn missing_config_file_is_recognized() {
        let err = ConfigError::from(io::Error::new(io::ErrorKind::NotFound, "nope"));
        assert!(err.is_file_not_found_error());

        let err = ConfigError::NoConfigPath;
        assert!(!err.is_file_not_found_error());
    }
}
