use std::path::Path;
use image::{imageops::FilterType, RgbImage};
use log::info;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

use crate::error::VisionError;
use crate::vision::types::{FaceBox, FaceLandmarks, Point};

pub const LANDMARK_COUNT: usize = 68;

// the face box is grown by this fraction before cropping, the landmark model
// was trained on crops that include the chin and eyebrows
const CROP_MARGIN: f32 = 0.1;

pub trait LandmarkDetector {
    /// The 68 landmarks of `face`, in frame pixel coordinates.
    fn detect(&mut self, frame: &RgbImage, face: &FaceBox) -> Result<FaceLandmarks, VisionError>;
}

/// A rectangle in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Square crop around `face`, enlarged by 10% and clamped to the frame.
pub fn crop_region(face: &FaceBox, frame_width: u32, frame_height: u32) -> Option<Region> {
    if frame_width == 0 || frame_height == 0 {
        return None;
    }

    let side = face.width.max(face.height) * (1.0 + CROP_MARGIN);
    let center_x = face.x + face.width / 2.0;
    let center_y = face.y + face.height / 2.0;

    let x1 = (center_x - side / 2.0).max(0.0);
    let y1 = (center_y - side / 2.0).max(0.0);
    let x2 = (center_x + side / 2.0).min(frame_width as f32);
    let y2 = (center_y + side / 2.0).min(frame_height as f32);

    if x2 - x1 < 1.0 || y2 - y1 < 1.0 {
        return None;
    }

    Some(Region {
        x: x1 as u32,
        y: y1 as u32,
        width: (x2 - x1) as u32,
        height: (y2 - y1) as u32,
    })
}

/// Maps `(x, y)` pairs normalized to `region` back to frame coordinates.
pub fn map_landmarks(values: &[f32], region: &Region) -> Result<FaceLandmarks, VisionError> {
    if values.len() < LANDMARK_COUNT * 2 {
        return Err(VisionError::InferenceFailed(
            format!("landmark model returned {} values, expected {}", values.len(), LANDMARK_COUNT * 2)
        ));
    }

    let points = values
        .chunks_exact(2)
        .take(LANDMARK_COUNT)
        .map(|pair| Point::new(
            region.x as f32 + pair[0] * region.width as f32,
            region.y as f32 + pair[1] * region.height as f32,
        ))
        .collect();

    Ok(FaceLandmarks { points })
}

pub struct LandmarkModel {
    session: Session,
    input_size: u32,
}

impl LandmarkModel {
    pub fn load(model_path: &Path, input_size: u32) -> Result<Self, VisionError> {
        if !model_path.exists() {
            return Err(VisionError::ModelNotFound(model_path.to_string_lossy().into_owned()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        info!("Loaded landmark model {} ({}x{})", model_path.to_string_lossy(), input_size, input_size);

        Ok(LandmarkModel { session, input_size })
    }

    fn preprocess(&self, crop: &RgbImage) -> Array4<f32> {
        let size = self.input_size;
        let resized = image::imageops::resize(crop, size, size, FilterType::Triangle);
        let mut tensor = Array4::<f32>::zeros((1, 3, size as usize, size as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
            }
        }

        tensor
    }
}

impl LandmarkDetector for LandmarkModel {
    fn detect(&mut self, frame: &RgbImage, face: &FaceBox) -> Result<FaceLandmarks, VisionError> {
        let region = crop_region(face, frame.width(), frame.height())
            .ok_or_else(|| VisionError::InferenceFailed("face lies outside of the frame".to_string()))?;

        let crop = image::imageops::crop_imm(frame, region.x, region.y, region.width, region.height).to_image();
        let input = self.preprocess(&crop);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, values) = outputs[0].try_extract_tensor::<f32>()?;

        map_landmarks(values, &region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_is_square_and_enlarged() {
        let face = FaceBox { x: 100.0, y: 100.0, width: 100.0, height: 80.0, confidence: 0.9 };

        let region = crop_region(&face, 640, 480).unwrap();

        // side 110, centered on (150, 140)
        assert_eq!(region, Region { x: 95, y: 85, width: 110, height: 110 });
    }

    #[test]
    fn crop_is_clamped_to_the_frame() {
        let face = FaceBox { x: 0.0, y: 0.0, width: 100.0, height: 100.0, confidence: 0.9 };

        let region = crop_region(&face, 640, 480).unwrap();

        assert_eq!(region.x, 0);
        assert_eq!(region.y, 0);
        assert_eq!(region.width, 105);
        assert_eq!(region.height, 105);

        let outside = FaceBox { x: 700.0, y: 10.0, width: 20.0, height: 20.0, confidence: 0.9 };
        assert!(crop_region(&outside, 640, 480).is_none());
    }

    #[test]
    fn landmarks_are_mapped_to_the_frame() {
        let region = Region { x: 10, y: 20, width: 100, height: 200 };
        let mut values = vec![0.0; LANDMARK_COUNT * 2];
        values[0] = 0.5;
        values[1] = 0.25;
        values[LANDMARK_COUNT * 2 - 2] = 1.0;
        values[LANDMARK_COUNT * 2 - 1] = 1.0;

        let landmarks = map_landmarks(&values, &region).unwrap();

        assert_eq!(landmarks.points.len(), LANDMARK_COUNT);
        assert_eq!(landmarks.points[0], Point::new(60.0, 70.0));
        assert_eq!(landmarks.points[1], Point::new(10.0, 20.0));
        assert_eq!(landmarks.points[LANDMARK_COUNT - 1], Point::new(110.0, 220.0));
    }

    #[test]
    fn short_model_output_is_an_error() {
        let region = Region { x: 0, y: 0, width: 10, height: 10 };

        assert!(matches!(map_landmarks(&[0.0; 10], &region), Err(VisionError::InferenceFailed(_))));
    }
}
