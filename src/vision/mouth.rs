//! Mouth aspect ratio (MAR) and the open/closed classification built on it.

use crate::vision::types::{FaceLandmarks, Point};

/// Mouths with a larger ratio are considered open.
pub const DEFAULT_MAR_THRESHOLD: f32 = 0.69;

/// First landmark of the mouth slice (0-based index into the 68 point model).
pub const MOUTH_START: usize = 49;
/// One past the last landmark of the mouth slice.
pub const MOUTH_END: usize = 68;
pub const MOUTH_POINTS: usize = MOUTH_END - MOUTH_START;

pub type Mouth = [Point; MOUTH_POINTS];

pub fn mouth_points(landmarks: &FaceLandmarks) -> Option<Mouth> {
    let slice = landmarks.points.get(MOUTH_START..MOUTH_END)?;
    let mut mouth = [Point::default(); MOUTH_POINTS];
    mouth.copy_from_slice(slice);
    Some(mouth)
}

/// MAR = (|P2 - P10| + |P4 - P8|) / (2 |P0 - P6|)
///
/// A mouth without width yields 0.
pub fn mouth_aspect_ratio(mouth: &Mouth) -> f32 {
    let a = mouth[2].distance(&mouth[10]);
    let b = mouth[4].distance(&mouth[8]);
    let c = mouth[0].distance(&mouth[6]);

    if c <= f32::EPSILON {
        return 0.0;
    }

    (a + b) / (2.0 * c)
}

/// Tracks the open/closed state and reports only changes.
#[derive(Debug, Clone)]
pub struct MouthClassifier {
    threshold: f32,
    open: bool,
}

impl MouthClassifier {
    pub fn new(threshold: f32) -> Self {
        MouthClassifier { threshold, open: false }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Returns the new state when `mar` crosses the threshold, None otherwise.
    pub fn update(&mut self, mar: f32) -> Option<bool> {
        let open = mar > self.threshold;
        if open == self.open {
            return None;
        }

        self.open = open;
        Some(open)
    }
}

impl Default for MouthClassifier {
    fn default() -> Self {
        MouthClassifier::new(DEFAULT_MAR_THRESHOLD)
    }
}
