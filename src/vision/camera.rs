use image::{imageops::FilterType, RgbImage};
use log::{info, warn};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    Camera,
};

use crate::error::VisionError;

pub struct CameraSource {
    camera: Camera,
}

impl CameraSource {
    pub fn open(index: u32) -> Result<Self, VisionError> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested)?;

        camera.open_stream()?;

        info!("Opened camera {}: {} ({})", index, camera.info().human_name(), camera.camera_format());

        Ok(CameraSource { camera })
    }

    pub fn capture(&mut self) -> Result<RgbImage, VisionError> {
        let frame = self.camera.frame()?;
        Ok(frame.decode_image::<RgbFormat>()?)
    }

    pub fn name(&self) -> String {
        self.camera.info().human_name()
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(err) = self.camera.stop_stream() {
            warn!("Failed to stop camera stream: {}", err);
        }
    }
}

/// (index, human readable name) of every camera the OS reports.
pub fn list_cameras() -> Result<Vec<(String, String)>, VisionError> {
    let cameras = nokhwa::query(ApiBackend::Auto)?;

    Ok(cameras
        .into_iter()
        .map(|camera| (camera.index().to_string(), camera.human_name()))
        .collect())
}

/// Scales `frame` to `width` pixels wide, keeping its aspect ratio.
pub fn resize_to_width(frame: RgbImage, width: u32) -> RgbImage {
    if frame.width() == width || frame.width() == 0 || width == 0 {
        return frame;
    }

    let height = ((frame.height() as u64 * width as u64) / frame.width() as u64).max(1) as u32;
    image::imageops::resize(&frame, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resizing_keeps_the_aspect_ratio() {
        let frame = RgbImage::new(1280, 720);

        let resized = resize_to_width(frame, 640);

        assert_eq!(resized.dimensions(), (640, 360));
    }

    #[test]
    fn frames_of_the_right_width_are_untouched() {
        let frame = RgbImage::new(640, 480);

        assert_eq!(resize_to_width(frame, 640).dimensions(), (640, 480));
    }
}
