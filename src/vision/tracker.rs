use std::cmp::Ordering;
use image::RgbImage;

use crate::error::VisionError;
use crate::vision::detector::FaceDetector;
use crate::vision::landmarks::LandmarkDetector;
use crate::vision::mouth::{mouth_aspect_ratio, mouth_points, Mouth, MouthClassifier};
use crate::vision::types::FaceBox;

/// What a single frame told us about the mouth.
#[derive(Debug, Clone, Default)]
pub struct FrameAnalysis {
    pub face: Option<FaceBox>,
    pub mouth: Option<Mouth>,
    pub mar: Option<f32>,
    /// Set only when the open/closed state changed in this frame.
    pub mouth_changed: Option<bool>,
}

pub struct MouthTracker<D, L> {
    detector: D,
    landmarks: L,
    classifier: MouthClassifier,
}

impl<D: FaceDetector, L: LandmarkDetector> MouthTracker<D, L> {
    pub fn new(detector: D, landmarks: L, mar_threshold: f32) -> Self {
        MouthTracker {
            detector,
            landmarks,
            classifier: MouthClassifier::new(mar_threshold),
        }
    }

    pub fn is_mouth_open(&self) -> bool {
        self.classifier.is_open()
    }

    /// Only the most confident face is considered. A frame without a face
    /// leaves the mouth state as it was.
    pub fn process(&mut self, frame: &RgbImage) -> Result<FrameAnalysis, VisionError> {
        let faces = self.detector.detect(frame)?;
        let face = faces
            .into_iter()
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(Ordering::Equal));

        let face = match face {
            Some(face) => face,
            None => return Ok(FrameAnalysis::default()),
        };

        let landmarks = self.landmarks.detect(frame, &face)?;
        let mouth = mouth_points(&landmarks).ok_or_else(|| VisionError::InferenceFailed(
            format!("expected 68 landmarks, got {}", landmarks.points.len())
        ))?;

        let mar = mouth_aspect_ratio(&mouth);
        let mouth_changed = self.classifier.update(mar);

        Ok(FrameAnalysis {
            face: Some(face),
            mouth: Some(mouth),
            mar: Some(mar),
            mouth_changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use crate::vision::mouth::{tests::mouth_with, MOUTH_START};
    use crate::vision::types::{FaceLandmarks, Point};

    struct FakeDetector {
        frames: VecDeque<Vec<FaceBox>>,
    }

    impl FaceDetector for FakeDetector {
        fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<FaceBox>, VisionError> {
            Ok(self.frames.pop_front().unwrap_or_default())
        }
    }

    // a face with confidence c gets a mouth whose gap is c * 100 and width 60
    struct FakeLandmarks {
        seen: Vec<FaceBox>,
    }

    impl LandmarkDetector for FakeLandmarks {
        fn detect(&mut self, _frame: &RgbImage, face: &FaceBox) -> Result<FaceLandmarks, VisionError> {
            self.seen.push(*face);

            let mut points = vec![Point::default(); 68];
            let mouth = mouth_with(60.0, face.confidence * 100.0);
            points[MOUTH_START..MOUTH_START + mouth.len()].copy_from_slice(&mouth);
            Ok(FaceLandmarks { points })
        }
    }

    fn face(x: f32, confidence: f32) -> FaceBox {
        FaceBox { x, y: 0.0, width: 50.0, height: 50.0, confidence }
    }

    fn tracker(frames: Vec<Vec<FaceBox>>) -> MouthTracker<FakeDetector, FakeLandmarks> {
        MouthTracker::new(
            FakeDetector { frames: frames.into() },
            FakeLandmarks { seen: Vec::new() },
            0.69,
        )
    }

    #[test]
    fn mouth_changes_are_reported_once() {
        // gap 30 => MAR 0.5, gap 90 => MAR 1.5
        let mut tracker = tracker(vec![
            vec![face(0.0, 0.3)],
            vec![face(0.0, 0.9)],
            vec![face(0.0, 0.9)],
            vec![face(0.0, 0.3)],
        ]);
        let frame = RgbImage::new(8, 8);

        let first = tracker.process(&frame).unwrap();
        assert!((first.mar.unwrap() - 0.5).abs() < 1e-4);
        assert_eq!(first.mouth_changed, None);

        assert_eq!(tracker.process(&frame).unwrap().mouth_changed, Some(true));
        assert_eq!(tracker.process(&frame).unwrap().mouth_changed, None);
        assert!(tracker.is_mouth_open());
        assert_eq!(tracker.process(&frame).unwrap().mouth_changed, Some(false));
    }

    #[test]
    fn missing_face_keeps_the_state() {
        let mut tracker = tracker(vec![
            vec![face(0.0, 0.9)],
            vec![],
        ]);
        let frame = RgbImage::new(8, 8);

        assert_eq!(tracker.process(&frame).unwrap().mouth_changed, Some(true));

        let empty = tracker.process(&frame).unwrap();
        assert!(empty.face.is_none());
        assert!(empty.mar.is_none());
        assert_eq!(empty.mouth_changed, None);
        assert!(tracker.is_mouth_open());
    }

    #[test]
    fn most_confident_face_wins() {
        let mut tracker = tracker(vec![
            vec![face(0.0, 0.75), face(100.0, 0.95), face(200.0, 0.8)],
        ]);

        let analysis = tracker.process(&RgbImage::new(8, 8)).unwrap();

        assert_eq!(analysis.face.unwrap().x, 100.0);
        assert_eq!(tracker.landmarks.seen.len(), 1);
        assert_eq!(tracker.landmarks.seen[0].x, 100.0);
    }
}
