use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use crate::command::keys::{default_key_bindings, normalize_key_bindings, KeyBinding};
use crate::vision::mouth::DEFAULT_MAR_THRESHOLD;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceConfig {
    /// Bluetooth name the prop advertises.
    pub name: String,
    /// When set, only the device with this address is used.
    pub address: Option<String>,
    pub rfcomm_channel: u8,
    /// An OS-bound serial device (e.g. /dev/rfcomm0 or COM5). Skips discovery.
    pub serial_path: Option<PathBuf>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            name: "El Poisson".to_string(),
            address: None,
            rfcomm_channel: 1,
            serial_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MidiConfig {
    pub enabled: bool,
    pub port_name: String,
    /// Incoming notes identical to a note we sent this recently are treated as loopback.
    pub echo_window_ms: u64,
}

impl Default for MidiConfig {
    fn default() -> Self {
        MidiConfig {
            enabled: true,
            port_name: "El Poisson".to_string(),
            echo_window_ms: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisionConfig {
    pub camera_index: u32,
    pub frame_width: u32,
    pub face_detector_model: PathBuf,
    pub landmark_model: PathBuf,
    pub landmark_input_size: u32,
    pub face_confidence: f32,
    pub mar_threshold: f32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        VisionConfig {
            camera_index: 0,
            frame_width: 640,
            face_detector_model: PathBuf::from("models/version-RFB-320.onnx"),
            landmark_model: PathBuf::from("models/face_landmarks_68.onnx"),
            landmark_input_size: 112,
            face_confidence: 0.7,
            mar_threshold: DEFAULT_MAR_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub device: DeviceConfig,
    pub midi: MidiConfig,
    pub vision: VisionConfig,
    pub key_bindings: Vec<KeyBinding>,
    pub face_image: Option<PathBuf>,
}

impl Config {
    pub fn normalize(&mut self) {
        normalize_key_bindings(&mut self.key_bindings);

        let vision = &mut self.vision;
        vision.frame_width = vision.frame_width.clamp(160, 1920);
        vision.landmark_input_size = vision.landmark_input_size.clamp(32, 512);
        vision.face_confidence = clamp_unit(vision.face_confidence, 0.7);
        if !vision.mar_threshold.is_finite() || vision.mar_threshold <= 0.0 {
            vision.mar_threshold = DEFAULT_MAR_THRESHOLD;
        }

        if self.device.rfcomm_channel == 0 || self.device.rfcomm_channel > 30 {
            self.device.rfcomm_channel = DeviceConfig::default().rfcomm_channel;
        }
    }
}

fn clamp_unit(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value.clamp(0.0, 1.0) } else { fallback }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device: DeviceConfig::default(),
            midi: MidiConfig::default(),
            vision: VisionConfig::default(),
            key_bindings: default_key_bindings(),
            face_image: None,
        }
    }
}
