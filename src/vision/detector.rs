//! UltraFace (RFB-320) face detector via ONNX Runtime.
//!
//! Expects the export without post-processing: `scores` `[1, N, 2]` and `boxes`
//! `[1, N, 4]` encoded against the prior boxes generated here.

use std::path::Path;
use image::{imageops::FilterType, RgbImage};
use log::info;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

use crate::error::VisionError;
use crate::vision::types::FaceBox;

const INPUT_WIDTH: u32 = 320;
const INPUT_HEIGHT: u32 = 240;
const INPUT_MEAN: f32 = 127.0;
const INPUT_STD: f32 = 128.0;
const CENTER_VARIANCE: f32 = 0.1;
const SIZE_VARIANCE: f32 = 0.2;
const NMS_THRESHOLD: f32 = 0.3;
const SHRINKAGES: [u32; 4] = [8, 16, 32, 64];
const MIN_BOXES: [&[f32]; 4] = [&[10.0, 16.0, 24.0], &[32.0, 48.0], &[64.0, 96.0], &[128.0, 192.0, 256.0]];

pub trait FaceDetector {
    /// Faces in `frame`, in frame pixel coordinates.
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<FaceBox>, VisionError>;
}

/// Prior box in normalized coordinates: center x, center y, width, height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub cx: f32,
    pub cy: f32,
    pub width: f32,
    pub height: f32,
}

pub fn generate_anchors(width: u32, height: u32) -> Vec<Anchor> {
    let mut anchors = Vec::new();
    let w = width as f32;
    let h = height as f32;

    for (shrinkage, min_boxes) in SHRINKAGES.iter().zip(MIN_BOXES.iter()) {
        let shrinkage = *shrinkage as f32;
        let feature_w = (w / shrinkage).ceil() as u32;
        let feature_h = (h / shrinkage).ceil() as u32;

        for v in 0..feature_h {
            for u in 0..feature_w {
                let cx = (u as f32 * shrinkage + shrinkage / 2.0) / w;
                let cy = (v as f32 * shrinkage + shrinkage / 2.0) / h;

                for min_box in min_boxes.iter() {
                    anchors.push(Anchor { cx, cy, width: min_box / w, height: min_box / h });
                }
            }
        }
    }

    anchors
}

/// Decodes all candidates scoring above `threshold` into boxes scaled to the frame.
pub fn decode(
    anchors: &[Anchor],
    scores: &[f32],
    boxes: &[f32],
    threshold: f32,
    frame_width: u32,
    frame_height: u32,
) -> Vec<FaceBox> {
    let frame_w = frame_width as f32;
    let frame_h = frame_height as f32;
    let mut faces = Vec::new();

    for (index, anchor) in anchors.iter().enumerate() {
        // [background, face]
        let score = match scores.get(index * 2 + 1) {
            Some(score) => *score,
            None => break,
        };
        if score <= threshold {
            continue;
        }

        let encoded = match boxes.get(index * 4..index * 4 + 4) {
            Some(encoded) => encoded,
            None => break,
        };

        let cx = encoded[0] * CENTER_VARIANCE * anchor.width + anchor.cx;
        let cy = encoded[1] * CENTER_VARIANCE * anchor.height + anchor.cy;
        let w = (encoded[2] * SIZE_VARIANCE).exp() * anchor.width;
        let h = (encoded[3] * SIZE_VARIANCE).exp() * anchor.height;

        let x1 = ((cx - w / 2.0) * frame_w).clamp(0.0, frame_w);
        let y1 = ((cy - h / 2.0) * frame_h).clamp(0.0, frame_h);
        let x2 = ((cx + w / 2.0) * frame_w).clamp(0.0, frame_w);
        let y2 = ((cy + h / 2.0) * frame_h).clamp(0.0, frame_h);

        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        faces.push(FaceBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
        });
    }

    faces
}

/// Non-maximum suppression; the result is sorted by confidence, best first.
pub fn nms(mut faces: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    faces.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();
    for face in faces {
        if keep.iter().all(|kept| kept.iou(&face) <= iou_threshold) {
            keep.push(face);
        }
    }

    keep
}

pub struct UltraFaceDetector {
    session: Session,
    anchors: Vec<Anchor>,
    confidence: f32,
}

impl UltraFaceDetector {
    pub fn load(model_path: &Path, confidence: f32) -> Result<Self, VisionError> {
        if !model_path.exists() {
            return Err(VisionError::ModelNotFound(model_path.to_string_lossy().into_owned()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        info!("Loaded face detector {}", model_path.to_string_lossy());

        Ok(UltraFaceDetector {
            session,
            anchors: generate_anchors(INPUT_WIDTH, INPUT_HEIGHT),
            confidence,
        })
    }

    fn preprocess(frame: &RgbImage) -> Array4<f32> {
        let resized = image::imageops::resize(frame, INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle);
        let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] = (pixel[channel] as f32 - INPUT_MEAN) / INPUT_STD;
            }
        }

        tensor
    }
}

impl FaceDetector for UltraFaceDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<FaceBox>, VisionError> {
        let input = Self::preprocess(frame);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let scores = outputs
            .get("scores")
            .ok_or_else(|| VisionError::InferenceFailed("face detector has no \"scores\" output".to_string()))?;
        let boxes = outputs
            .get("boxes")
            .ok_or_else(|| VisionError::InferenceFailed("face detector has no \"boxes\" output".to_string()))?;

        let (_, scores) = scores.try_extract_tensor::<f32>()?;
        let (_, boxes) = boxes.try_extract_tensor::<f32>()?;

        let faces = decode(&self.anchors, scores, boxes, self.confidence, frame.width(), frame.height());
        Ok(nms(faces, NMS_THRESHOLD))
    }
}
